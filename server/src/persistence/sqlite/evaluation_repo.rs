//! SQLite-backed repository for live position evaluations.

use sqlx::SqlitePool;

use super::helpers::{decode_score, encode_score};
use crate::persistence::traits::EvaluationRepository;
use crate::persistence::{PersistenceError, PositionEvaluation};

#[derive(sqlx::FromRow)]
struct EvaluationRow {
    game_id: String,
    score_type: String,
    score_value: i64,
    depth: i64,
    win_probability_white: f64,
    win_probability_black: f64,
    ply_count: i64,
    updated_at: i64,
}

impl From<EvaluationRow> for PositionEvaluation {
    fn from(r: EvaluationRow) -> Self {
        Self {
            score: decode_score(&r.score_type, r.score_value),
            game_id: r.game_id,
            depth: r.depth as u8,
            win_probability_white: r.win_probability_white,
            win_probability_black: r.win_probability_black,
            ply_count: r.ply_count as u32,
            updated_at: r.updated_at as u64,
        }
    }
}

/// SQLite implementation of [`EvaluationRepository`].
pub struct SqliteEvaluationRepository {
    pool: SqlitePool,
}

impl SqliteEvaluationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EvaluationRepository for SqliteEvaluationRepository {
    async fn upsert_evaluation(&self, evaluation: &PositionEvaluation) -> Result<(), PersistenceError> {
        let (score_type, score_value) = encode_score(&evaluation.score);

        sqlx::query(
            r#"
            INSERT INTO evaluations
                (game_id, score_type, score_value, depth, win_probability_white,
                 win_probability_black, ply_count, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(game_id) DO UPDATE SET
                score_type            = excluded.score_type,
                score_value           = excluded.score_value,
                depth                 = excluded.depth,
                win_probability_white = excluded.win_probability_white,
                win_probability_black = excluded.win_probability_black,
                ply_count             = excluded.ply_count,
                updated_at            = excluded.updated_at
            "#,
        )
        .bind(&evaluation.game_id)
        .bind(score_type)
        .bind(score_value as i64)
        .bind(evaluation.depth as i64)
        .bind(evaluation.win_probability_white)
        .bind(evaluation.win_probability_black)
        .bind(evaluation.ply_count as i64)
        .bind(evaluation.updated_at as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_evaluation(&self, game_id: &str) -> Result<Option<PositionEvaluation>, PersistenceError> {
        let row: Option<EvaluationRow> = sqlx::query_as(
            r#"
            SELECT game_id, score_type, score_value, depth, win_probability_white,
                   win_probability_black, ply_count, updated_at
            FROM evaluations
            WHERE game_id = ?
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PositionEvaluation::from))
    }
}
