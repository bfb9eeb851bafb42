//! SQLite-backed reads of the recent-games ring buffer.
//!
//! Writes happen inside [`super::SqliteGameRepository::finish_game`], in the
//! same transaction that closes the game.

use sqlx::SqlitePool;

use super::helpers::decode_status;
use crate::persistence::traits::SummaryRepository;
use crate::persistence::{GameSummary, PersistenceError, RECENT_GAMES_CAPACITY};

#[derive(sqlx::FromRow)]
struct SummaryRow {
    game_id: String,
    player_id: String,
    status: String,
    player_moves: i64,
    brilliant: i64,
    good: i64,
    okay: i64,
    blunder: i64,
    finished_at: i64,
}

impl TryFrom<SummaryRow> for GameSummary {
    type Error = PersistenceError;

    fn try_from(r: SummaryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: decode_status(&r.status)?,
            game_id: r.game_id,
            player_id: r.player_id,
            player_moves: r.player_moves as u32,
            brilliant: r.brilliant as u32,
            good: r.good as u32,
            okay: r.okay as u32,
            blunder: r.blunder as u32,
            finished_at: r.finished_at as u64,
        })
    }
}

/// SQLite implementation of [`SummaryRepository`].
pub struct SqliteSummaryRepository {
    pool: SqlitePool,
}

impl SqliteSummaryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SummaryRepository for SqliteSummaryRepository {
    async fn recent_summaries(&self, player_id: &str) -> Result<Vec<GameSummary>, PersistenceError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT game_id, player_id, status, player_moves, brilliant, good, okay,
                   blunder, finished_at
            FROM game_summaries
            WHERE player_id = ?
            ORDER BY finished_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(player_id)
        .bind(RECENT_GAMES_CAPACITY as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GameSummary::try_from).collect()
    }
}
