//! SQLite-backed repository for player accounts.

use sqlx::SqlitePool;

use super::helpers::conflict_on_unique;
use crate::persistence::traits::PlayerRepository;
use crate::persistence::{PersistenceError, Player, PlayerFilter};

/// Row type for player queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct PlayerRow {
    player_id: String,
    username: String,
    email: String,
    password_hash: String,
    rating: i64,
    wins: i64,
    losses: i64,
    draws: i64,
    total_games: i64,
    created_at: i64,
}

impl From<PlayerRow> for Player {
    fn from(r: PlayerRow) -> Self {
        Self {
            id: r.player_id,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            rating: r.rating as u32,
            wins: r.wins as u32,
            losses: r.losses as u32,
            draws: r.draws as u32,
            total_games: r.total_games as u32,
            created_at: r.created_at as u64,
        }
    }
}

const PLAYER_COLUMNS: &str = "player_id, username, email, password_hash, rating, \
                              wins, losses, draws, total_games, created_at";

// Unset filter fields are bound as NULL and match everything.
const FILTER_CLAUSE: &str = "(? IS NULL OR player_id = ?) \
                             AND (? IS NULL OR username = ?) \
                             AND (? IS NULL OR email = ?)";

/// SQLite implementation of [`PlayerRepository`].
pub struct SqlitePlayerRepository {
    pool: SqlitePool,
}

impl SqlitePlayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PlayerRepository for SqlitePlayerRepository {
    async fn insert_player(&self, player: &Player) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO players
                (player_id, username, email, password_hash, rating,
                 wins, losses, draws, total_games, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&player.id)
        .bind(&player.username)
        .bind(&player.email)
        .bind(&player.password_hash)
        .bind(player.rating as i64)
        .bind(player.wins as i64)
        .bind(player.losses as i64)
        .bind(player.draws as i64)
        .bind(player.total_games as i64)
        .bind(player.created_at as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!(
                    "username {:?} or email {:?} is taken",
                    player.username, player.email
                )
            })
        })?;

        Ok(())
    }

    async fn find_player(&self, filter: &PlayerFilter) -> Result<Option<Player>, PersistenceError> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE {FILTER_CLAUSE} \
             ORDER BY created_at, rowid LIMIT 1"
        );
        let row: Option<PlayerRow> = sqlx::query_as(&sql)
            .bind(&filter.id)
            .bind(&filter.id)
            .bind(&filter.username)
            .bind(&filter.username)
            .bind(&filter.email)
            .bind(&filter.email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Player::from))
    }

    async fn count_players(&self, filter: &PlayerFilter) -> Result<u64, PersistenceError> {
        let sql = format!("SELECT COUNT(*) FROM players WHERE {FILTER_CLAUSE}");
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(&filter.id)
            .bind(&filter.id)
            .bind(&filter.username)
            .bind(&filter.username)
            .bind(&filter.email)
            .bind(&filter.email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn add_rating(&self, player_id: &str, increment: u32) -> Result<u32, PersistenceError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE players SET rating = rating + ? WHERE player_id = ? RETURNING rating",
        )
        .bind(increment as i64)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(rating,)| rating as u32)
            .ok_or_else(|| PersistenceError::Corrupt(format!("unknown player {player_id}")))
    }

    async fn leaderboard(&self, limit: u32) -> Result<Vec<Player>, PersistenceError> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM players \
             ORDER BY rating DESC, created_at, rowid LIMIT ?"
        );
        let rows: Vec<PlayerRow> = sqlx::query_as(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Player::from).collect())
    }
}
