//! Records kept by the store and the repository traits over them.
//!
//! The store is SQLite (see [`sqlite`]); everything above this module talks
//! to it through the traits in [`traits`], bundled by [`Persistence`].

pub mod sqlite;
pub mod traits;

pub use traits::{
    EvaluationRepository, GameRepository, MoveRepository, Persistence, PlayerRepository,
    SummaryRepository,
};

use std::time::{SystemTime, UNIX_EPOCH};

use chess::{AnalysisScore, Capture};
use serde::{Deserialize, Serialize};

use crate::analysis::classifier::MoveQuality;
use crate::session::difficulty::Difficulty;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    /// A uniqueness rule was violated (duplicate username, second active game).
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Lifecycle of a game. Every state other than `InProgress` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    InProgress,
    PlayerWin,
    AiWin,
    Draw,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::PlayerWin => "PLAYER_WIN",
            Self::AiWin => "AI_WIN",
            Self::Draw => "DRAW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(Self::InProgress),
            "PLAYER_WIN" => Some(Self::PlayerWin),
            "AI_WIN" => Some(Self::AiWin),
            "DRAW" => Some(Self::Draw),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::InProgress
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who made a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mover {
    /// The synthetic record holding the starting position.
    Initial,
    Player,
    Oracle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub rating: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
    pub created_at: u64,
}

/// Lookup criteria for players. Every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerFilter {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl PlayerFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub player_id: String,
    pub status: GameStatus,
    pub difficulty: Difficulty,
    pub started_at: u64,
    pub ended_at: Option<u64>,
}

/// One entry of a game's move ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub game_id: String,
    /// 0 for the initial record, then 1, 2, ... in play order.
    pub seq: u32,
    pub mover: Mover,
    /// UCI notation; empty for the initial record.
    pub notation: String,
    pub fen_after: String,
    pub quality: Option<MoveQuality>,
    pub capture: Option<Capture>,
    pub created_at: u64,
}

impl MoveRecord {
    pub fn initial(game_id: &str, fen: &str, created_at: u64) -> Self {
        Self {
            game_id: game_id.to_string(),
            seq: 0,
            mover: Mover::Initial,
            notation: String::new(),
            fen_after: fen.to_string(),
            quality: None,
            capture: None,
            created_at,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.mover == Mover::Initial
    }
}

/// The single live evaluation of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEvaluation {
    pub game_id: String,
    /// White's perspective.
    pub score: AnalysisScore,
    pub depth: u8,
    pub win_probability_white: f64,
    pub win_probability_black: f64,
    /// Number of real moves in the ledger the evaluation was computed for.
    pub ply_count: u32,
    pub updated_at: u64,
}

impl PositionEvaluation {
    /// The row written when a game starts: even odds, depth 0, score 0.
    pub fn initial(game_id: &str, updated_at: u64) -> Self {
        Self {
            game_id: game_id.to_string(),
            score: AnalysisScore::Centipawns(0),
            depth: 0,
            win_probability_white: 50.0,
            win_probability_black: 50.0,
            ply_count: 0,
            updated_at,
        }
    }
}

/// Compact record of a finished game, kept in the player's ring buffer of
/// recent games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    pub game_id: String,
    pub player_id: String,
    pub status: GameStatus,
    pub player_moves: u32,
    pub brilliant: u32,
    pub good: u32,
    pub okay: u32,
    pub blunder: u32,
    pub finished_at: u64,
}

impl GameSummary {
    /// Tally a finished game's ledger.
    pub fn from_ledger(game: &GameRecord, status: GameStatus, moves: &[MoveRecord], finished_at: u64) -> Self {
        let mut summary = Self {
            game_id: game.id.clone(),
            player_id: game.player_id.clone(),
            status,
            player_moves: 0,
            brilliant: 0,
            good: 0,
            okay: 0,
            blunder: 0,
            finished_at,
        };
        for record in moves.iter().filter(|m| m.mover == Mover::Player) {
            summary.player_moves += 1;
            match record.quality {
                Some(MoveQuality::Brilliant) => summary.brilliant += 1,
                Some(MoveQuality::Good) => summary.good += 1,
                Some(MoveQuality::Okay) => summary.okay += 1,
                Some(MoveQuality::Blunder) => summary.blunder += 1,
                None => {}
            }
        }
        summary
    }
}

/// Number of recent game summaries kept per player.
pub const RECENT_GAMES_CAPACITY: u32 = 3;

/// Generate a unique record id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
