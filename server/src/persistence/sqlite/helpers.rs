//! Shared encode/decode helpers for SQLite ↔ domain type conversions.
//!
//! These functions bridge the gap between domain enums and the string/integer
//! columns used in the SQLite schema's CHECK constraints.

use chess::{AnalysisScore, Capture, PieceColor, PieceKind};

use crate::analysis::classifier::MoveQuality;
use crate::persistence::{GameStatus, Mover, PersistenceError};
use crate::session::difficulty::Difficulty;

// ── AnalysisScore ──────────────────────────────────────────────────────

/// Encode an `AnalysisScore` into `(type_str, value)` for the
/// `score_type` / `score_value` columns.
pub fn encode_score(score: &AnalysisScore) -> (&'static str, i32) {
    match score {
        AnalysisScore::Centipawns(v) => ("cp", *v),
        AnalysisScore::Mate(v) => ("mate", *v),
    }
}

/// Decode a `(type_str, value)` pair from SQLite back into an `AnalysisScore`.
pub fn decode_score(type_str: &str, value: i64) -> AnalysisScore {
    match type_str {
        "mate" => AnalysisScore::Mate(value as i32),
        _ => AnalysisScore::Centipawns(value as i32),
    }
}

// ── Enum columns ───────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<GameStatus, PersistenceError> {
    GameStatus::parse(s).ok_or_else(|| PersistenceError::Corrupt(format!("game status {s:?}")))
}

pub fn decode_difficulty(s: &str) -> Result<Difficulty, PersistenceError> {
    s.parse()
        .map_err(|_| PersistenceError::Corrupt(format!("difficulty {s:?}")))
}

pub fn encode_mover(mover: Mover) -> &'static str {
    match mover {
        Mover::Initial => "initial",
        Mover::Player => "player",
        Mover::Oracle => "oracle",
    }
}

pub fn decode_mover(s: &str) -> Result<Mover, PersistenceError> {
    match s {
        "initial" => Ok(Mover::Initial),
        "player" => Ok(Mover::Player),
        "oracle" => Ok(Mover::Oracle),
        _ => Err(PersistenceError::Corrupt(format!("mover {s:?}"))),
    }
}

/// Encode a `MoveQuality` to the string used in the SQLite CHECK.
pub fn encode_quality(q: MoveQuality) -> &'static str {
    match q {
        MoveQuality::Brilliant => "Brilliant",
        MoveQuality::Good => "Good",
        MoveQuality::Okay => "Okay",
        MoveQuality::Blunder => "Blunder",
    }
}

pub fn decode_quality(s: &str) -> Result<MoveQuality, PersistenceError> {
    match s {
        "Brilliant" => Ok(MoveQuality::Brilliant),
        "Good" => Ok(MoveQuality::Good),
        "Okay" => Ok(MoveQuality::Okay),
        "Blunder" => Ok(MoveQuality::Blunder),
        _ => Err(PersistenceError::Corrupt(format!("move quality {s:?}"))),
    }
}

// ── Capture ────────────────────────────────────────────────────────────

/// Encode a capture into `(moved_piece, captured_piece, en_passant)`.
/// The captured piece keeps its FEN case so the victim's color survives.
pub fn encode_capture(capture: Option<&Capture>) -> (Option<String>, Option<String>, bool) {
    match capture {
        Some(c) => (
            Some(c.moved.to_char_upper().to_string()),
            Some(c.captured.fen_char(c.captured_color).to_string()),
            c.en_passant,
        ),
        None => (None, None, false),
    }
}

pub fn decode_capture(
    moved: Option<&str>,
    captured: Option<&str>,
    en_passant: bool,
) -> Result<Option<Capture>, PersistenceError> {
    let (Some(moved), Some(captured)) = (moved, captured) else {
        return Ok(None);
    };
    let corrupt = || PersistenceError::Corrupt(format!("capture {moved:?}x{captured:?}"));

    let moved = moved
        .chars()
        .next()
        .and_then(PieceKind::from_char)
        .ok_or_else(corrupt)?;
    let captured_char = captured.chars().next().ok_or_else(corrupt)?;
    let captured_kind = PieceKind::from_char(captured_char).ok_or_else(corrupt)?;
    let captured_color = if captured_char.is_ascii_uppercase() {
        PieceColor::White
    } else {
        PieceColor::Black
    };

    Ok(Some(Capture {
        moved,
        captured: captured_kind,
        captured_color,
        en_passant,
    }))
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Turn a UNIQUE-constraint failure into [`PersistenceError::Conflict`].
pub fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> PersistenceError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PersistenceError::Conflict(what())
        }
        _ => PersistenceError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_columns() {
        assert_eq!(encode_score(&AnalysisScore::Centipawns(-42)), ("cp", -42));
        assert_eq!(decode_score("mate", -1), AnalysisScore::Mate(-1));
        assert_eq!(decode_score("cp", 150), AnalysisScore::Centipawns(150));
    }

    #[test]
    fn capture_keeps_victim_color() {
        let capture = Capture {
            moved: PieceKind::Knight,
            captured: PieceKind::Queen,
            captured_color: PieceColor::Black,
            en_passant: false,
        };
        let (moved, captured, ep) = encode_capture(Some(&capture));
        assert_eq!(moved.as_deref(), Some("N"));
        assert_eq!(captured.as_deref(), Some("q"));
        let decoded = decode_capture(moved.as_deref(), captured.as_deref(), ep).unwrap();
        assert_eq!(decoded, Some(capture));

        assert_eq!(decode_capture(None, None, false).unwrap(), None);
    }

    #[test]
    fn unknown_enum_values_are_corrupt() {
        assert!(matches!(decode_status("PAUSED"), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(decode_mover("robot"), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(decode_quality("Best"), Err(PersistenceError::Corrupt(_))));
        assert!(decode_capture(Some("N"), Some("x"), false).is_err());
    }
}
