pub mod analysis;
pub mod board_display;
pub mod fen;
pub mod game;
pub mod types;
pub mod uci;

pub use analysis::{AnalysisScore, WinProbability};
pub use board_display::{Capture, DisplayBoard, DisplayBoardError};
pub use fen::{FenError, STARTING_FEN};
pub use game::{Game, GameError, PositionStatus};
pub use types::{PieceColor, PieceKind};
pub use uci::{
    convert_cozy_castling_to_uci, convert_uci_castling_to_cozy, format_square, format_uci_move,
    parse_uci_move, UciMoveError,
};
