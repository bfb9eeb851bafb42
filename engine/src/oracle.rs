//! The move-legality / evaluation / best-move oracle contract.
//!
//! An oracle holds a "current position" as internal state. Every query
//! answers for the position most recently passed to [`Oracle::set_position`],
//! so callers must set the position immediately before querying it. The
//! actor in [`crate::actor`] is the only thing that drives an oracle in the
//! server.

use std::future::Future;
use std::time::Duration;

use chess::{AnalysisScore, PieceColor, PositionStatus};

/// Highest Stockfish "Skill Level"; analysis queries run at this strength.
pub const MAX_SKILL_LEVEL: u8 = 20;

/// A position described either by the moves played from the standard start,
/// or by an explicit FEN followed by moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    Moves(Vec<String>),
    Fen { fen: String, moves: Vec<String> },
}

/// A score returned by the oracle, from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub score: AnalysisScore,
    pub depth: u8,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
    #[error("Oracle did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}

impl Position {
    pub fn start() -> Self {
        Self::Moves(Vec::new())
    }

    pub fn from_fen(fen: impl Into<String>) -> Self {
        Self::Fen {
            fen: fen.into(),
            moves: Vec::new(),
        }
    }

    pub fn moves(&self) -> &[String] {
        match self {
            Self::Moves(moves) | Self::Fen { moves, .. } => moves,
        }
    }

    /// The same position with one more move played.
    pub fn with_move(&self, mv: &str) -> Self {
        let mut next = self.clone();
        match &mut next {
            Self::Moves(moves) | Self::Fen { moves, .. } => moves.push(mv.to_string()),
        }
        next
    }

    pub fn ply_count(&self) -> usize {
        self.moves().len()
    }
}

impl From<chess::GameError> for OracleError {
    fn from(err: chess::GameError) -> Self {
        Self::InvalidPosition(err.to_string())
    }
}

impl From<crate::UciError> for OracleError {
    fn from(err: crate::UciError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A black-box chess oracle.
///
/// Search methods return `impl Future + Send` so an oracle can be moved into
/// a spawned actor task.
pub trait Oracle: Send + 'static {
    /// Make `position` the current position. Fails with
    /// [`OracleError::InvalidPosition`] if the moves do not replay.
    fn set_position(
        &mut self,
        position: &Position,
    ) -> impl Future<Output = Result<(), OracleError>> + Send;

    /// FEN of the current position.
    fn fen(&self) -> String;

    fn status(&self) -> PositionStatus;

    fn side_to_move(&self) -> PieceColor;

    /// Whether a UCI move is legal in the current position.
    fn is_legal(&self, mv: &str) -> bool;

    /// Best move in UCI notation, `None` when the position has no legal moves.
    fn best_move(
        &mut self,
        depth: u8,
    ) -> impl Future<Output = Result<Option<String>, OracleError>> + Send;

    fn evaluate(&mut self, depth: u8)
        -> impl Future<Output = Result<Evaluation, OracleError>> + Send;

    /// Human-readable grid of the current position.
    fn render(&self) -> String;

    fn set_skill_level(&mut self, level: u8)
        -> impl Future<Output = Result<(), OracleError>> + Send;
}

/// Score of a position that has no legal moves, or `None` if play continues.
pub(crate) fn terminal_score(status: PositionStatus) -> Option<AnalysisScore> {
    match status {
        PositionStatus::Checkmate => Some(AnalysisScore::Mate(0)),
        PositionStatus::Draw => Some(AnalysisScore::Centipawns(0)),
        PositionStatus::Ongoing => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_move_keeps_original() {
        let start = Position::start();
        let next = start.with_move("e2e4");
        assert_eq!(start.ply_count(), 0);
        assert_eq!(next.moves(), ["e2e4".to_string()]);

        let fen = Position::from_fen(chess::STARTING_FEN).with_move("d2d4");
        assert!(matches!(fen, Position::Fen { ref moves, .. } if moves.len() == 1));
    }
}
