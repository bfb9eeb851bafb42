//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**, so readers never block the single writer.
//! - **Foreign keys enabled** at the connection level.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/` when
//!   [`Database::open`] is called.
//!
//! ## Repository types
//!
//! Each `Sqlite*Repository` holds a `SqlitePool` and implements the
//! corresponding trait from [`crate::persistence::traits`]:
//!
//! | Type | Trait |
//! |------|-------|
//! | [`SqlitePlayerRepository`] | `PlayerRepository` |
//! | [`SqliteGameRepository`] | `GameRepository` |
//! | [`SqliteMoveRepository`] | `MoveRepository` |
//! | [`SqliteEvaluationRepository`] | `EvaluationRepository` |
//! | [`SqliteSummaryRepository`] | `SummaryRepository` |
//!
//! [`SqlitePersistence`] bundles all five behind the `Persistence` trait.
//!
//! The one-active-game rule and the ring-buffer bound are enforced here: the
//! first by a partial unique index, the second by evicting inside the
//! transaction that finishes a game.

mod database;
mod evaluation_repo;
mod game_repo;
mod move_repo;
mod player_repo;
mod summary_repo;
pub(crate) mod helpers;

pub use database::Database;
pub use evaluation_repo::SqliteEvaluationRepository;
pub use game_repo::SqliteGameRepository;
pub use move_repo::SqliteMoveRepository;
pub use player_repo::SqlitePlayerRepository;
pub use summary_repo::SqliteSummaryRepository;

use crate::persistence::Persistence;

/// All repositories over one connection pool.
pub struct SqlitePersistence {
    players: SqlitePlayerRepository,
    games: SqliteGameRepository,
    moves: SqliteMoveRepository,
    evaluations: SqliteEvaluationRepository,
    summaries: SqliteSummaryRepository,
}

impl SqlitePersistence {
    pub fn from_database(db: &Database) -> Self {
        let pool = db.pool();
        Self {
            players: SqlitePlayerRepository::new(pool.clone()),
            games: SqliteGameRepository::new(pool.clone()),
            moves: SqliteMoveRepository::new(pool.clone()),
            evaluations: SqliteEvaluationRepository::new(pool.clone()),
            summaries: SqliteSummaryRepository::new(pool.clone()),
        }
    }
}

impl Persistence for SqlitePersistence {
    type Players = SqlitePlayerRepository;
    type Games = SqliteGameRepository;
    type Moves = SqliteMoveRepository;
    type Evaluations = SqliteEvaluationRepository;
    type Summaries = SqliteSummaryRepository;

    fn players(&self) -> &Self::Players {
        &self.players
    }

    fn games(&self) -> &Self::Games {
        &self.games
    }

    fn moves(&self) -> &Self::Moves {
        &self.moves
    }

    fn evaluations(&self) -> &Self::Evaluations {
        &self.evaluations
    }

    fn summaries(&self) -> &Self::Summaries {
        &self.summaries
    }
}
