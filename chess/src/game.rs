use cozy_chess::{Board, GameStatus, Move};

use crate::fen::{format_fen, parse_fen, FenError};
use crate::types::PieceColor;
use crate::uci::{
    convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, format_uci_move, parse_uci_move,
    UciMoveError,
};

/// A position reached from a starting FEN by a list of UCI moves.
///
/// This is the board model behind the oracle adapters: it answers legality,
/// produces FEN snapshots and reports terminal status.
#[derive(Debug, Clone)]
pub struct Game {
    start: Board,
    position: Board,
    moves: Vec<String>,
}

/// Terminal status of a position, from the board's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Ongoing,
    /// The side to move has been checkmated.
    Checkmate,
    /// Stalemate or another automatic draw.
    Draw,
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self {
            start: Board::default(),
            position: Board::default(),
            moves: Vec::new(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let board = parse_fen(fen)?;
        Ok(Self {
            start: board.clone(),
            position: board,
            moves: Vec::new(),
        })
    }

    /// Replay UCI moves from the standard starting position.
    pub fn from_moves<S: AsRef<str>>(moves: &[S]) -> Result<Self, GameError> {
        let mut game = Self::new();
        for mv in moves {
            game.play_uci(mv.as_ref())?;
        }
        Ok(game)
    }

    pub fn position(&self) -> &Board {
        &self.position
    }

    /// UCI moves played since the start position.
    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn start_fen(&self) -> String {
        format_fen(&self.start)
    }

    /// Resolve a UCI string to the legal cozy-chess move it denotes.
    fn resolve(&self, uci: &str) -> Result<Move, GameError> {
        let mv = parse_uci_move(uci)?;
        let legal = self.legal_moves();
        let converted = convert_uci_castling_to_cozy(mv, &legal);
        // Castling is only accepted as the king's two-square move.
        if legal.contains(&converted)
            && convert_cozy_castling_to_uci(&self.position, converted) == mv
        {
            Ok(converted)
        } else {
            Err(GameError::IllegalMove(uci.to_string()))
        }
    }

    pub fn is_legal_uci(&self, uci: &str) -> bool {
        self.resolve(uci).is_ok()
    }

    /// Play a UCI move, returning its normalized UCI form.
    pub fn play_uci(&mut self, uci: &str) -> Result<String, GameError> {
        let mv = self.resolve(uci)?;
        let normalized = format_uci_move(convert_cozy_castling_to_uci(&self.position, mv));
        self.position.play_unchecked(mv);
        self.moves.push(normalized.clone());
        Ok(normalized)
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Legal moves in standard UCI notation.
    pub fn legal_moves_uci(&self) -> Vec<String> {
        self.legal_moves()
            .into_iter()
            .map(|mv| format_uci_move(convert_cozy_castling_to_uci(&self.position, mv)))
            .collect()
    }

    pub fn status(&self) -> PositionStatus {
        match self.position.status() {
            GameStatus::Won => PositionStatus::Checkmate,
            GameStatus::Drawn => PositionStatus::Draw,
            GameStatus::Ongoing => PositionStatus::Ongoing,
        }
    }

    pub fn side_to_move(&self) -> PieceColor {
        self.position.side_to_move().into()
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        format_fen(&self.position)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Move notation error: {0}")]
    Notation(#[from] UciMoveError),
    #[error("FEN parse error: {0}")]
    FenError(#[from] FenError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::STARTING_FEN;

    #[test]
    fn test_new_game_is_start_position() {
        let game = Game::new();
        assert_eq!(game.to_fen(), STARTING_FEN);
        assert_eq!(game.side_to_move(), PieceColor::White);
        assert_eq!(game.legal_moves().len(), 20);
    }

    #[test]
    fn test_illegal_move_is_rejected_without_side_effects() {
        let mut game = Game::new();
        assert!(matches!(
            game.play_uci("e2e5"),
            Err(GameError::IllegalMove(_))
        ));
        assert!(game.moves().is_empty());
        assert_eq!(game.to_fen(), STARTING_FEN);
    }

    #[test]
    fn test_fools_mate_is_checkmate() {
        let game = Game::from_moves(&["f2f3", "e7e5", "g2g4", "d8h4"]).unwrap();
        assert_eq!(game.status(), PositionStatus::Checkmate);
        assert_eq!(game.side_to_move(), PieceColor::White);
        assert!(game.legal_moves().is_empty());
    }

    #[test]
    fn test_stalemate_is_draw() {
        // Black king h8, white queen g6, white king f7: black to move, no legal moves.
        let game = Game::from_fen("7k/5K2/6Q1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(game.status(), PositionStatus::Draw);
    }

    #[test]
    fn test_castling_is_recorded_in_standard_notation() {
        let mut game = Game::from_moves(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]).unwrap();
        assert!(game.legal_moves_uci().contains(&"e1g1".to_string()));
        let played = game.play_uci("e1g1").unwrap();
        assert_eq!(played, "e1g1");
        assert_eq!(game.moves().last().map(String::as_str), Some("e1g1"));
    }

    #[test]
    fn test_castling_onto_rook_square_is_rejected() {
        let mut game = Game::from_moves(&["e2e4", "e7e5", "g1f3", "b8c6", "f1c4", "g8f6"]).unwrap();
        assert!(!game.is_legal_uci("e1h1"));
        assert!(matches!(game.play_uci("e1h1"), Err(GameError::IllegalMove(_))));
        assert!(game.is_legal_uci("e1g1"));
        assert_eq!(game.moves().len(), 6);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let moves = ["d2d4", "d7d5", "c2c4", "e7e6"];
        let a = Game::from_moves(&moves).unwrap();
        let b = Game::from_moves(&moves).unwrap();
        assert_eq!(a.to_fen(), b.to_fen());
    }
}
