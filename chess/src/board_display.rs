//! Lightweight board grid parsed from FEN, used for rendering and for
//! comparing consecutive position snapshots.

use serde::{Deserialize, Serialize};

use crate::types::{PieceColor, PieceKind};

/// An 8x8 board for display purposes only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayBoard {
    squares: [[Option<(PieceKind, PieceColor)>; 8]; 8],
}

/// A piece removed from the board by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub moved: PieceKind,
    pub captured: PieceKind,
    pub captured_color: PieceColor,
    pub en_passant: bool,
}

impl DisplayBoard {
    /// Parse the board placement from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, DisplayBoardError> {
        let placement = fen
            .split_whitespace()
            .next()
            .ok_or(DisplayBoardError::InvalidFen)?;

        let mut squares = [[None; 8]; 8];
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(DisplayBoardError::InvalidFen);
        }

        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                    continue;
                }
                if file > 7 {
                    return Err(DisplayBoardError::InvalidFen);
                }
                let color = if c.is_ascii_uppercase() {
                    PieceColor::White
                } else {
                    PieceColor::Black
                };
                let kind = PieceKind::from_char(c).ok_or(DisplayBoardError::InvalidPiece(c))?;
                squares[rank][file] = Some((kind, color));
                file += 1;
            }
            if file != 8 {
                return Err(DisplayBoardError::InvalidFen);
            }
        }

        Ok(DisplayBoard { squares })
    }

    pub fn piece_at(&self, file: u8, rank: u8) -> Option<(PieceKind, PieceColor)> {
        if file > 7 || rank > 7 {
            return None;
        }
        self.squares[rank as usize][file as usize]
    }

    /// Piece on an algebraic square such as "e4".
    pub fn piece_on(&self, square: &str) -> Option<(PieceKind, PieceColor)> {
        let (file, rank) = square_coords(square)?;
        self.piece_at(file, rank)
    }

    /// Text grid with rank labels on the left and file labels underneath,
    /// White at the bottom. Empty squares print as '.'.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(8 * 20 + 24);
        for rank in (0..8u8).rev() {
            out.push((b'1' + rank) as char);
            out.push(' ');
            for file in 0..8u8 {
                out.push(' ');
                out.push(match self.piece_at(file, rank) {
                    Some((kind, color)) => kind.fen_char(color),
                    None => '.',
                });
            }
            out.push('\n');
        }
        out.push_str("   a b c d e f g h\n");
        out
    }

    /// Work out what, if anything, a UCI move captured by comparing the
    /// grid before the move (`self`) with the grid after it.
    ///
    /// Castling is never a capture even though cozy-chess style notation puts
    /// the king on its own rook.
    pub fn detect_capture(&self, after: &DisplayBoard, uci: &str) -> Option<Capture> {
        let from = square_coords(uci.get(0..2)?)?;
        let to = square_coords(uci.get(2..4)?)?;
        let (moved, mover_color) = self.piece_at(from.0, from.1)?;

        if let Some((captured, captured_color)) = self.piece_at(to.0, to.1) {
            if captured_color == mover_color {
                return None;
            }
            let after_piece = after.piece_at(to.0, to.1);
            if after_piece.map(|(_, c)| c) == Some(mover_color) {
                return Some(Capture {
                    moved,
                    captured,
                    captured_color,
                    en_passant: false,
                });
            }
            return None;
        }

        // A pawn changing file onto an empty square took en passant; the
        // victim sits beside the origin on the destination file.
        if moved == PieceKind::Pawn && from.0 != to.0 {
            let victim = self.piece_at(to.0, from.1)?;
            if victim.1 != mover_color && after.piece_at(to.0, from.1).is_none() {
                return Some(Capture {
                    moved,
                    captured: victim.0,
                    captured_color: victim.1,
                    en_passant: true,
                });
            }
        }

        None
    }
}

fn square_coords(square: &str) -> Option<(u8, u8)> {
    let bytes = square.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a').filter(|f| *f < 8)?;
    let rank = bytes[1].checked_sub(b'1').filter(|r| *r < 8)?;
    Some((file, rank))
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayBoardError {
    #[error("Invalid FEN string")]
    InvalidFen,
    #[error("Invalid piece character: {0}")]
    InvalidPiece(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::STARTING_FEN;

    #[test]
    fn test_starting_position() {
        let board = DisplayBoard::from_fen(STARTING_FEN).unwrap();
        assert_eq!(
            board.piece_at(4, 0),
            Some((PieceKind::King, PieceColor::White))
        );
        assert_eq!(
            board.piece_on("d8"),
            Some((PieceKind::Queen, PieceColor::Black))
        );
        assert_eq!(board.piece_on("e4"), None);
    }

    #[test]
    fn test_rejects_short_rank() {
        assert!(DisplayBoard::from_fen("rnbqkbn/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w").is_err());
        assert!(matches!(
            DisplayBoard::from_fen("xnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"),
            Err(DisplayBoardError::InvalidPiece('x'))
        ));
    }

    #[test]
    fn test_render_grid() {
        let board = DisplayBoard::from_fen(STARTING_FEN).unwrap();
        let text = board.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "8  r n b q k b n r");
        assert_eq!(lines[4], "4  . . . . . . . .");
        assert_eq!(lines[7], "1  R N B Q K B N R");
        assert_eq!(lines[8], "   a b c d e f g h");
    }

    #[test]
    fn test_detect_plain_capture() {
        // 1. e4 d5 2. exd5
        let before =
            DisplayBoard::from_fen("rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 2")
                .unwrap();
        let after =
            DisplayBoard::from_fen("rnbqkbnr/ppp1pppp/8/3P4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2")
                .unwrap();
        let capture = before.detect_capture(&after, "e4d5").unwrap();
        assert_eq!(capture.moved, PieceKind::Pawn);
        assert_eq!(capture.captured, PieceKind::Pawn);
        assert_eq!(capture.captured_color, PieceColor::Black);
        assert!(!capture.en_passant);
    }

    #[test]
    fn test_detect_en_passant() {
        let before =
            DisplayBoard::from_fen("rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3")
                .unwrap();
        let after =
            DisplayBoard::from_fen("rnbqkbnr/ppp1p1pp/5P2/3p4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 3")
                .unwrap();
        let capture = before.detect_capture(&after, "e5f6").unwrap();
        assert!(capture.en_passant);
        assert_eq!(capture.captured, PieceKind::Pawn);
    }

    #[test]
    fn test_quiet_move_and_castling_are_not_captures() {
        let before = DisplayBoard::from_fen(STARTING_FEN).unwrap();
        let after =
            DisplayBoard::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
                .unwrap();
        assert_eq!(before.detect_capture(&after, "e2e4"), None);

        let before = DisplayBoard::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let after = DisplayBoard::from_fen("r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1").unwrap();
        assert_eq!(before.detect_capture(&after, "e1g1"), None);
        assert_eq!(before.detect_capture(&after, "e1h1"), None);
    }
}
