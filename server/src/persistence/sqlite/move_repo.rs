//! SQLite-backed repository for the move ledger.

use sqlx::SqlitePool;

use super::helpers::{
    conflict_on_unique, decode_capture, decode_mover, decode_quality, encode_capture,
    encode_mover, encode_quality,
};
use crate::persistence::traits::MoveRepository;
use crate::persistence::{MoveRecord, PersistenceError};

/// Row type for move queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct MoveRow {
    game_id: String,
    seq: i64,
    mover: String,
    notation: String,
    fen_after: String,
    quality: Option<String>,
    moved_piece: Option<String>,
    captured_piece: Option<String>,
    en_passant: bool,
    created_at: i64,
}

impl TryFrom<MoveRow> for MoveRecord {
    type Error = PersistenceError;

    fn try_from(r: MoveRow) -> Result<Self, Self::Error> {
        Ok(Self {
            capture: decode_capture(
                r.moved_piece.as_deref(),
                r.captured_piece.as_deref(),
                r.en_passant,
            )?,
            quality: r.quality.as_deref().map(decode_quality).transpose()?,
            mover: decode_mover(&r.mover)?,
            game_id: r.game_id,
            seq: r.seq as u32,
            notation: r.notation,
            fen_after: r.fen_after,
            created_at: r.created_at as u64,
        })
    }
}

/// SQLite implementation of [`MoveRepository`].
pub struct SqliteMoveRepository {
    pool: SqlitePool,
}

impl SqliteMoveRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MoveRepository for SqliteMoveRepository {
    async fn append_move(&self, record: &MoveRecord) -> Result<(), PersistenceError> {
        let (moved_piece, captured_piece, en_passant) = encode_capture(record.capture.as_ref());

        sqlx::query(
            r#"
            INSERT INTO moves
                (game_id, seq, mover, notation, fen_after, quality,
                 moved_piece, captured_piece, en_passant, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.game_id)
        .bind(record.seq as i64)
        .bind(encode_mover(record.mover))
        .bind(&record.notation)
        .bind(&record.fen_after)
        .bind(record.quality.map(encode_quality))
        .bind(moved_piece)
        .bind(captured_piece)
        .bind(en_passant)
        .bind(record.created_at as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("ledger slot {} of game {} is taken", record.seq, record.game_id)
            })
        })?;

        Ok(())
    }

    async fn list_moves(&self, game_id: &str) -> Result<Vec<MoveRecord>, PersistenceError> {
        let rows: Vec<MoveRow> = sqlx::query_as(
            r#"
            SELECT game_id, seq, mover, notation, fen_after, quality,
                   moved_piece, captured_piece, en_passant, created_at
            FROM moves
            WHERE game_id = ?
            ORDER BY seq
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MoveRecord::try_from).collect()
    }
}
