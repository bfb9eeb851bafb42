//! Async repository trait definitions for the persistence layer.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so that
//! the futures are guaranteed `Send`, which `tokio::spawn` needs for the
//! background evaluator.

use std::future::Future;

use super::{
    GameRecord, GameStatus, GameSummary, MoveRecord, PersistenceError, Player, PlayerFilter,
    PositionEvaluation,
};

pub trait PlayerRepository: Send + Sync {
    /// Fails with [`PersistenceError::Conflict`] if the username is taken.
    fn insert_player(
        &self,
        player: &Player,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    /// First player matching every set field of `filter`, oldest first.
    fn find_player(
        &self,
        filter: &PlayerFilter,
    ) -> impl Future<Output = Result<Option<Player>, PersistenceError>> + Send;
    fn count_players(
        &self,
        filter: &PlayerFilter,
    ) -> impl Future<Output = Result<u64, PersistenceError>> + Send;
    /// Add `increment` to the player's rating and return the new rating.
    fn add_rating(
        &self,
        player_id: &str,
        increment: u32,
    ) -> impl Future<Output = Result<u32, PersistenceError>> + Send;
    /// Players ordered by rating, highest first.
    fn leaderboard(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Player>, PersistenceError>> + Send;
}

/// Repository for game sessions.
///
/// Creation and finishing are multi-row writes and run in one transaction:
/// a new game is stored with its initial ledger record and evaluation row;
/// finishing a game updates the player's counters and pushes the game's
/// summary into the ring buffer.
pub trait GameRepository: Send + Sync {
    /// Fails with [`PersistenceError::Conflict`] if the player already has
    /// an IN_PROGRESS game.
    fn create_game(
        &self,
        game: &GameRecord,
        initial_move: &MoveRecord,
        initial_evaluation: &PositionEvaluation,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn load_game(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<Option<GameRecord>, PersistenceError>> + Send;
    fn active_game(
        &self,
        player_id: &str,
    ) -> impl Future<Output = Result<Option<GameRecord>, PersistenceError>> + Send;
    /// The player's most recently started game, whatever its status.
    fn latest_game(
        &self,
        player_id: &str,
    ) -> impl Future<Output = Result<Option<GameRecord>, PersistenceError>> + Send;
    fn count_games(
        &self,
        player_id: &str,
        status: Option<GameStatus>,
    ) -> impl Future<Output = Result<u64, PersistenceError>> + Send;
    /// Move an IN_PROGRESS game to `summary.status`. Returns `false` and
    /// writes nothing if the game was no longer IN_PROGRESS.
    fn finish_game(
        &self,
        summary: &GameSummary,
    ) -> impl Future<Output = Result<bool, PersistenceError>> + Send;
}

/// Repository for the append-only move ledger.
pub trait MoveRepository: Send + Sync {
    fn append_move(
        &self,
        record: &MoveRecord,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    /// Every record of the game, initial record first.
    fn list_moves(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<Vec<MoveRecord>, PersistenceError>> + Send;
}

/// Repository for the single live evaluation per game.
pub trait EvaluationRepository: Send + Sync {
    fn upsert_evaluation(
        &self,
        evaluation: &PositionEvaluation,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
    fn load_evaluation(
        &self,
        game_id: &str,
    ) -> impl Future<Output = Result<Option<PositionEvaluation>, PersistenceError>> + Send;
}

/// Repository for the per-player ring buffer of recent game summaries.
pub trait SummaryRepository: Send + Sync {
    /// Newest first, at most [`super::RECENT_GAMES_CAPACITY`] entries.
    fn recent_summaries(
        &self,
        player_id: &str,
    ) -> impl Future<Output = Result<Vec<GameSummary>, PersistenceError>> + Send;
}

/// A complete store: one repository per aggregate.
pub trait Persistence: Send + Sync + 'static {
    type Players: PlayerRepository;
    type Games: GameRepository;
    type Moves: MoveRepository;
    type Evaluations: EvaluationRepository;
    type Summaries: SummaryRepository;

    fn players(&self) -> &Self::Players;
    fn games(&self) -> &Self::Games;
    fn moves(&self) -> &Self::Moves;
    fn evaluations(&self) -> &Self::Evaluations;
    fn summaries(&self) -> &Self::Summaries;
}
