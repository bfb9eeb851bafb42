//! SQLite-backed repository for game sessions.

use sqlx::SqlitePool;

use super::helpers::{
    conflict_on_unique, decode_difficulty, decode_status, encode_capture, encode_mover,
    encode_quality, encode_score,
};
use crate::persistence::traits::GameRepository;
use crate::persistence::{
    GameRecord, GameStatus, GameSummary, MoveRecord, PersistenceError, PositionEvaluation,
    RECENT_GAMES_CAPACITY,
};

/// Row type for game queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct GameRow {
    game_id: String,
    player_id: String,
    status: String,
    difficulty: String,
    started_at: i64,
    ended_at: Option<i64>,
}

impl TryFrom<GameRow> for GameRecord {
    type Error = PersistenceError;

    fn try_from(r: GameRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.game_id,
            player_id: r.player_id,
            status: decode_status(&r.status)?,
            difficulty: decode_difficulty(&r.difficulty)?,
            started_at: r.started_at as u64,
            ended_at: r.ended_at.map(|v| v as u64),
        })
    }
}

const GAME_COLUMNS: &str = "game_id, player_id, status, difficulty, started_at, ended_at";

/// SQLite implementation of [`GameRepository`].
pub struct SqliteGameRepository {
    pool: SqlitePool,
}

impl SqliteGameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_game(
        &self,
        filter: &str,
        key: &str,
    ) -> Result<Option<GameRecord>, PersistenceError> {
        let sql = format!("SELECT {GAME_COLUMNS} FROM games WHERE {filter}");
        let row: Option<GameRow> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(GameRecord::try_from).transpose()
    }
}

impl GameRepository for SqliteGameRepository {
    async fn create_game(
        &self,
        game: &GameRecord,
        initial_move: &MoveRecord,
        initial_evaluation: &PositionEvaluation,
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO games (game_id, player_id, status, difficulty, started_at, ended_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&game.id)
        .bind(&game.player_id)
        .bind(game.status.as_str())
        .bind(game.difficulty.as_str())
        .bind(game.started_at as i64)
        .bind(game.ended_at.map(|v| v as i64))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("player {} already has a game in progress", game.player_id)
            })
        })?;

        let (moved_piece, captured_piece, en_passant) =
            encode_capture(initial_move.capture.as_ref());
        sqlx::query(
            r#"
            INSERT INTO moves
                (game_id, seq, mover, notation, fen_after, quality,
                 moved_piece, captured_piece, en_passant, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&initial_move.game_id)
        .bind(initial_move.seq as i64)
        .bind(encode_mover(initial_move.mover))
        .bind(&initial_move.notation)
        .bind(&initial_move.fen_after)
        .bind(initial_move.quality.map(encode_quality))
        .bind(moved_piece)
        .bind(captured_piece)
        .bind(en_passant)
        .bind(initial_move.created_at as i64)
        .execute(&mut *tx)
        .await?;

        let (score_type, score_value) = encode_score(&initial_evaluation.score);
        sqlx::query(
            r#"
            INSERT INTO evaluations
                (game_id, score_type, score_value, depth, win_probability_white,
                 win_probability_black, ply_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&initial_evaluation.game_id)
        .bind(score_type)
        .bind(score_value as i64)
        .bind(initial_evaluation.depth as i64)
        .bind(initial_evaluation.win_probability_white)
        .bind(initial_evaluation.win_probability_black)
        .bind(initial_evaluation.ply_count as i64)
        .bind(initial_evaluation.updated_at as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_game(&self, game_id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        self.fetch_one_game("game_id = ?", game_id).await
    }

    async fn active_game(&self, player_id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        self.fetch_one_game("player_id = ? AND status = 'IN_PROGRESS'", player_id)
            .await
    }

    async fn latest_game(&self, player_id: &str) -> Result<Option<GameRecord>, PersistenceError> {
        self.fetch_one_game(
            "player_id = ? ORDER BY started_at DESC, rowid DESC LIMIT 1",
            player_id,
        )
        .await
    }

    async fn count_games(
        &self,
        player_id: &str,
        status: Option<GameStatus>,
    ) -> Result<u64, PersistenceError> {
        let status = status.map(GameStatus::as_str);
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM games WHERE player_id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(player_id)
        .bind(status)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn finish_game(&self, summary: &GameSummary) -> Result<bool, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let status = summary.status.as_str();

        let updated = sqlx::query(
            "UPDATE games SET status = ?, ended_at = ? \
             WHERE game_id = ? AND status = 'IN_PROGRESS'",
        )
        .bind(status)
        .bind(summary.finished_at as i64)
        .bind(&summary.game_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE players SET
                wins        = wins   + (? = 'PLAYER_WIN'),
                losses      = losses + (? = 'AI_WIN'),
                draws       = draws  + (? = 'DRAW'),
                total_games = total_games + 1
            WHERE player_id = ?
            "#,
        )
        .bind(status)
        .bind(status)
        .bind(status)
        .bind(&summary.player_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO game_summaries
                (game_id, player_id, status, player_moves, brilliant, good, okay,
                 blunder, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.game_id)
        .bind(&summary.player_id)
        .bind(status)
        .bind(summary.player_moves as i64)
        .bind(summary.brilliant as i64)
        .bind(summary.good as i64)
        .bind(summary.okay as i64)
        .bind(summary.blunder as i64)
        .bind(summary.finished_at as i64)
        .execute(&mut *tx)
        .await?;

        // Keep only the newest entries of the player's ring buffer.
        let evicted = sqlx::query(
            r#"
            DELETE FROM game_summaries
            WHERE player_id = ?
              AND game_id NOT IN (
                  SELECT game_id FROM game_summaries
                  WHERE player_id = ?
                  ORDER BY finished_at DESC, rowid DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(&summary.player_id)
        .bind(&summary.player_id)
        .bind(RECENT_GAMES_CAPACITY as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(
            game_id = %summary.game_id,
            status,
            evicted = evicted.rows_affected(),
            "Game finished"
        );
        Ok(true)
    }
}
