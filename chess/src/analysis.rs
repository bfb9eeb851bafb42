//! Engine evaluation scores and their derived quantities.

use serde::{Deserialize, Serialize};

use crate::types::PieceColor;

/// Magnitude a mate score maps to when it has to be compared as centipawns.
pub const MATE_CP: i32 = 30000;

/// Logistic scale used to turn centipawns into a win probability.
pub const WIN_PROBABILITY_K: f64 = 0.004;

/// Engine evaluation score.
///
/// Centipawns: positive = side-to-move is better.
/// Mate: positive N = side-to-move mates in N moves,
/// negative N = side-to-move gets mated in N moves,
/// zero = side-to-move is already checkmated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisScore {
    Centipawns(i32),
    Mate(i32),
}

/// Win probability split between the two sides, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinProbability {
    pub white: f64,
    pub black: f64,
}

impl AnalysisScore {
    pub fn display(&self) -> String {
        match self {
            Self::Centipawns(cp) => format!("{:+.2}", *cp as f64 / 100.0),
            Self::Mate(m) => {
                if *m > 0 {
                    format!("+M{}", m)
                } else {
                    format!("-M{}", m.abs())
                }
            }
        }
    }

    /// Convert to centipawns for comparison. Mate scores use large values.
    pub fn to_cp(&self) -> i32 {
        match self {
            Self::Centipawns(cp) => *cp,
            Self::Mate(m) => {
                if *m > 0 {
                    MATE_CP - *m * 100
                } else {
                    -MATE_CP - *m * 100
                }
            }
        }
    }

    /// Negate the score (flip perspective).
    pub fn negate(&self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(m) => Self::Mate(-m),
        }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, Self::Mate(_))
    }

    /// Re-express a side-to-move score from `perspective`'s point of view.
    pub fn for_side(&self, side_to_move: PieceColor, perspective: PieceColor) -> Self {
        if side_to_move == perspective {
            *self
        } else {
            self.negate()
        }
    }

    /// Winning chances of the side to move, in percent.
    ///
    /// Centipawns go through `100 / (1 + e^(-k*cp))`; mate scores skip the
    /// transform and return 100 or 0 outright.
    pub fn side_to_move_win_percent(&self) -> f64 {
        match self {
            Self::Mate(m) if *m > 0 => 100.0,
            Self::Mate(_) => 0.0,
            Self::Centipawns(cp) => 100.0 / (1.0 + (-WIN_PROBABILITY_K * *cp as f64).exp()),
        }
    }

    /// Split the side-to-move win probability into White/Black shares.
    pub fn win_probability(&self, side_to_move: PieceColor) -> WinProbability {
        let mover = self.side_to_move_win_percent();
        match side_to_move {
            PieceColor::White => WinProbability {
                white: mover,
                black: 100.0 - mover,
            },
            PieceColor::Black => WinProbability {
                white: 100.0 - mover,
                black: mover,
            },
        }
    }
}

impl WinProbability {
    pub const EVEN: Self = Self {
        white: 50.0,
        black: 50.0,
    };
}

impl std::fmt::Display for AnalysisScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
