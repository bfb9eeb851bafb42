use chess::Capture;
use serde::Serialize;

use crate::analysis::{MoveQuality, RatingOutcome};
use crate::persistence::{GameRecord, GameStatus, MoveRecord, PositionEvaluation};

/// Returned when a session starts.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStart {
    pub game: GameRecord,
    pub fen: String,
    pub rendering: String,
}

/// One move as it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayedMove {
    pub notation: String,
    pub fen_after: String,
    pub capture: Option<Capture>,
    /// Only player moves are classified.
    pub quality: Option<MoveQuality>,
}

/// Everything that happened in response to one player move.
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub game_id: String,
    pub player_move: PlayedMove,
    /// `None` when the player's move ended the game.
    pub oracle_move: Option<PlayedMove>,
    pub status: GameStatus,
    pub fen: String,
    pub rendering: String,
    /// Present when the game ended and the rating refresh succeeded.
    pub rating: Option<RatingOutcome>,
}

/// Complete read-only view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub game: GameRecord,
    /// The full ledger, initial record first.
    pub moves: Vec<MoveRecord>,
    pub fen: String,
    pub rendering: String,
}

/// The board after a given number of moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardView {
    pub game_id: String,
    pub ply: usize,
    pub fen: String,
    pub rendering: String,
}

/// A game's live evaluation together with the game it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub status: GameStatus,
    pub evaluation: PositionEvaluation,
    /// The evaluation lags behind the ledger until the evaluator catches up.
    pub stale: bool,
}
