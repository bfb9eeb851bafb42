pub mod actor;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod oracle;
pub mod stockfish;
pub mod uci;

pub use actor::{spawn_oracle, MoveAnalysis, OracleHandle, PositionInfo};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockOracle;
pub use oracle::{Evaluation, Oracle, OracleError, Position, MAX_SKILL_LEVEL};
pub use stockfish::{find_stockfish_path, EngineConfig, StockfishEngine, StockfishOracle};
pub use uci::{UciError, UciMessage};

use chess::AnalysisScore;
use cozy_chess::Move;

/// Commands written to the engine process
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// `fen: None` means the standard start position.
    SetPosition {
        fen: Option<String>,
        moves: Vec<String>,
    },
    SetOption {
        name: String,
        value: Option<String>,
    },
    Go(GoParams),
    IsReady,
    Stop,
    Quit,
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,
}

/// Events read back from the engine process
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Ready,
    BestMove(Option<Move>),
    Info(EngineInfo),
}

/// Engine analysis information
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    /// Side-to-move perspective.
    pub score: Option<AnalysisScore>,
    /// Set when the score is only a lower or upper bound.
    pub bound: bool,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u8>,
    pub nps: Option<u64>,
}

impl EngineCommand {
    /// The UCI line for this command, newline-terminated.
    pub fn to_uci_line(&self) -> String {
        let mut line = match self {
            Self::SetPosition { fen, moves } => {
                let mut cmd = match fen {
                    Some(fen) => format!("position fen {}", fen),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    cmd.push_str(" moves ");
                    cmd.push_str(&moves.join(" "));
                }
                cmd
            }
            Self::SetOption { name, value } => match value {
                Some(val) => format!("setoption name {} value {}", name, val),
                None => format!("setoption name {}", name),
            },
            Self::Go(params) => {
                if let Some(depth) = params.depth {
                    format!("go depth {}", depth)
                } else if let Some(movetime) = params.movetime {
                    format!("go movetime {}", movetime)
                } else {
                    "go movetime 1000".to_string()
                }
            }
            Self::IsReady => "isready".to_string(),
            Self::Stop => "stop".to_string(),
            Self::Quit => "quit".to_string(),
        };
        line.push('\n');
        line
    }
}
