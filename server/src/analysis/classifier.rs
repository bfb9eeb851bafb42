//! Move quality labels for player moves.

use chess::AnalysisScore;
use engine::MoveAnalysis;
use serde::{Deserialize, Serialize};

/// Quality label assigned to a player move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveQuality {
    /// Exactly as good as the oracle's best move.
    Brilliant,
    /// Less than 30 cp worse than best.
    Good,
    /// 30 to 99 cp worse than best.
    Okay,
    /// 100+ cp worse than best.
    Blunder,
}

impl MoveQuality {
    /// Bucket a played move by how it compares with the best move, in
    /// centipawns from the mover's point of view (negative = worse).
    ///
    /// Positive differences land in `Blunder`: only an exact match with the
    /// best move's outcome counts as `Brilliant`.
    pub fn from_diff_to_best(diff: i32) -> Self {
        match diff {
            0 => Self::Brilliant,
            -29..=-1 => Self::Good,
            -99..=-30 => Self::Okay,
            _ => Self::Blunder,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brilliant => "Brilliant",
            Self::Good => "Good",
            Self::Okay => "Okay",
            Self::Blunder => "Blunder",
        }
    }
}

impl std::fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centipawns for the side that just moved, given a score reported for the
/// side now to move.
pub(crate) fn mover_cp_after(score: &AnalysisScore) -> i32 {
    -score.to_cp()
}

/// `(after_played - before) - (after_best - before)`, all from the mover's
/// point of view.
pub fn diff_to_best(analysis: &MoveAnalysis) -> i32 {
    let before = analysis.before.score.to_cp();
    let after_played = mover_cp_after(&analysis.after_played.score);
    let after_best = analysis
        .after_best
        .as_ref()
        .map_or(after_played, |e| mover_cp_after(&e.score));

    let diff_user = after_played - before;
    let diff_best = after_best - before;
    diff_user - diff_best
}

/// Label the move `analysis` describes.
pub fn classify(analysis: &MoveAnalysis) -> MoveQuality {
    MoveQuality::from_diff_to_best(diff_to_best(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::Evaluation;

    fn eval(score: AnalysisScore) -> Evaluation {
        Evaluation { score, depth: 12 }
    }

    fn analysis(before: i32, after_played: i32, after_best: Option<i32>) -> MoveAnalysis {
        MoveAnalysis {
            best_move: Some("e2e4".to_string()),
            before: eval(AnalysisScore::Centipawns(before)),
            after_played: eval(AnalysisScore::Centipawns(after_played)),
            after_best: after_best.map(|cp| eval(AnalysisScore::Centipawns(cp))),
        }
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(MoveQuality::from_diff_to_best(0), MoveQuality::Brilliant);
        assert_eq!(MoveQuality::from_diff_to_best(-1), MoveQuality::Good);
        assert_eq!(MoveQuality::from_diff_to_best(-29), MoveQuality::Good);
        assert_eq!(MoveQuality::from_diff_to_best(-30), MoveQuality::Okay);
        assert_eq!(MoveQuality::from_diff_to_best(-99), MoveQuality::Okay);
        assert_eq!(MoveQuality::from_diff_to_best(-100), MoveQuality::Blunder);
        assert_eq!(MoveQuality::from_diff_to_best(-850), MoveQuality::Blunder);
        assert_eq!(MoveQuality::from_diff_to_best(15), MoveQuality::Blunder);
    }

    #[test]
    fn test_scores_are_flipped_to_mover() {
        // Best reply leaves the opponent at -40, played move leaves them at +10:
        // 50 cp worse for the mover.
        let a = analysis(30, 10, Some(-40));
        assert_eq!(diff_to_best(&a), -50);
        assert_eq!(classify(&a), MoveQuality::Okay);
    }

    #[test]
    fn test_playing_the_best_move() {
        let a = analysis(25, -25, Some(-25));
        assert_eq!(classify(&a), MoveQuality::Brilliant);
    }

    #[test]
    fn test_missing_best_uses_played() {
        let a = analysis(0, 300, None);
        assert_eq!(diff_to_best(&a), 0);
    }

    #[test]
    fn test_missing_a_mate() {
        let a = MoveAnalysis {
            best_move: Some("d8h4".to_string()),
            before: eval(AnalysisScore::Mate(1)),
            after_played: eval(AnalysisScore::Centipawns(0)),
            // Opponent is checkmated after the best move.
            after_best: Some(eval(AnalysisScore::Mate(0))),
        };
        assert_eq!(diff_to_best(&a), -30000);
        assert_eq!(classify(&a), MoveQuality::Blunder);
    }
}
