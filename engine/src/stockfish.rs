use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chess::{format_uci_move, Game, PieceColor, PositionStatus};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::oracle::{terminal_score, Evaluation, Oracle, OracleError, Position};
use crate::uci::{parse_uci_message, UciError, UciMessage};
use crate::{EngineCommand, EngineEvent, GoParams};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A Stockfish child process speaking UCI.
pub struct StockfishEngine {
    process: Child,
    command_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

/// Configuration for engine performance tuning.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Explicit executable path; common locations are searched otherwise.
    pub path: Option<PathBuf>,
    pub skill_level: Option<u8>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish instance and complete the UCI handshake.
    #[tracing::instrument(level = "info")]
    pub async fn spawn_with_config(config: EngineConfig) -> Result<Self, UciError> {
        let path = match config.path.clone() {
            Some(path) => path,
            None => find_stockfish_path().ok_or(UciError::NotFound)?,
        };
        tracing::info!("Found Stockfish at: {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn Stockfish: {}", e);
                UciError::Io(e)
            })?;

        let mut stdin = process.stdin.take().ok_or(UciError::NoStdin)?;
        let stdout = process.stdout.take().ok_or(UciError::NoStdout)?;

        stdin.write_all(b"uci\n").await?;
        stdin.flush().await?;

        let (command_tx, mut command_rx) = mpsc::channel::<EngineCommand>(32);
        let (event_tx, mut event_rx) = mpsc::channel::<EngineEvent>(64);

        // Output reader task
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Stockfish stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        tracing::trace!("UCI << {}", trimmed);

                        let event = match parse_uci_message(trimmed) {
                            Ok(UciMessage::UciOk) | Ok(UciMessage::ReadyOk) => EngineEvent::Ready,
                            Ok(UciMessage::BestMove { mv, .. }) => {
                                tracing::debug!("Received bestmove: {:?}", mv);
                                EngineEvent::BestMove(mv)
                            }
                            Ok(UciMessage::Info(info)) => EngineEvent::Info(info),
                            Ok(UciMessage::Id { .. }) => continue,
                            Err(_) => {
                                tracing::trace!("Ignoring UCI line: {}", trimmed);
                                continue;
                            }
                        };

                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from Stockfish stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::info!("Output reader task exiting");
        });

        let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            while let Some(event) = event_rx.recv().await {
                if matches!(event, EngineEvent::Ready) {
                    return Ok(());
                }
            }
            Err(UciError::Closed)
        })
        .await;
        match handshake {
            Ok(Ok(())) => tracing::debug!("Received uciok, engine ready"),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::error!("Timeout waiting for uciok");
                return Err(UciError::HandshakeTimeout);
            }
        }

        // Stdin writer task
        tokio::spawn(async move {
            while let Some(cmd) = command_rx.recv().await {
                let line = cmd.to_uci_line();
                tracing::trace!("UCI >> {}", line.trim());
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    tracing::error!("Failed to write to stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush stdin: {}", e);
                    break;
                }
                if matches!(cmd, EngineCommand::Quit) {
                    break;
                }
            }
            tracing::info!("Stdin writer task exiting");
        });

        let mut engine = Self {
            process,
            command_tx,
            event_rx,
        };

        if let Some(level) = config.skill_level {
            engine.set_option("Skill Level", level.to_string()).await?;
        }
        if let Some(threads) = config.threads {
            engine
                .set_option("Threads", threads.clamp(1, 16).to_string())
                .await?;
        }
        if let Some(hash_mb) = config.hash_mb {
            engine
                .set_option("Hash", hash_mb.clamp(1, 2048).to_string())
                .await?;
        }
        engine.sync().await?;

        tracing::info!("Stockfish engine spawned and initialized successfully");
        Ok(engine)
    }

    /// Send a command to the engine
    pub async fn send_command(&self, cmd: EngineCommand) -> Result<(), UciError> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| UciError::Closed)
    }

    pub async fn set_option(&self, name: &str, value: String) -> Result<(), UciError> {
        tracing::info!("Setting option {} = {}", name, value);
        self.send_command(EngineCommand::SetOption {
            name: name.to_string(),
            value: Some(value),
        })
        .await
    }

    /// Receive the next event from the engine
    pub async fn recv_event(&mut self) -> Result<EngineEvent, UciError> {
        self.event_rx.recv().await.ok_or(UciError::Closed)
    }

    /// Round-trip `isready`, discarding any output left over from earlier
    /// searches.
    pub async fn sync(&mut self) -> Result<(), UciError> {
        self.send_command(EngineCommand::IsReady).await?;
        loop {
            if let EngineEvent::Ready = self.recv_event().await? {
                return Ok(());
            }
        }
    }

    /// Search to `depth`, returning the best move and the last full-width
    /// info line seen.
    pub async fn search(
        &mut self,
        depth: u8,
    ) -> Result<(Option<cozy_chess::Move>, Option<crate::EngineInfo>), UciError> {
        self.send_command(EngineCommand::Go(GoParams {
            depth: Some(depth),
            movetime: None,
        }))
        .await?;

        let mut last_info = None;
        loop {
            match self.recv_event().await? {
                EngineEvent::Info(info) if info.score.is_some() && !info.bound => {
                    if info.multipv.unwrap_or(1) == 1 {
                        last_info = Some(info);
                    }
                }
                EngineEvent::BestMove(mv) => return Ok((mv, last_info)),
                _ => {}
            }
        }
    }

    /// Shutdown the engine
    pub async fn shutdown(mut self) {
        let _ = self.send_command(EngineCommand::Quit).await;
        let _ = tokio::time::timeout(Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }
}

/// Find Stockfish executable in common locations
pub fn find_stockfish_path() -> Option<PathBuf> {
    const CANDIDATES: [&str; 5] = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    CANDIDATES.into_iter().find_map(|candidate| {
        let path = Path::new(candidate);
        if !path.exists() && candidate != "stockfish" {
            return None;
        }
        std::process::Command::new(candidate)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .arg("quit")
            .status()
            .ok()
            .map(|_| PathBuf::from(candidate))
    })
}

/// [`Oracle`] backed by a Stockfish process.
///
/// Legality, FEN, terminal status and rendering come from the local board
/// model; search and evaluation go to the engine.
pub struct StockfishOracle {
    engine: StockfishEngine,
    game: Game,
}

impl StockfishOracle {
    pub async fn spawn(config: EngineConfig) -> Result<Self, UciError> {
        let engine = StockfishEngine::spawn_with_config(config).await?;
        Ok(Self {
            engine,
            game: Game::new(),
        })
    }

    pub async fn shutdown(self) {
        self.engine.shutdown().await;
    }
}

impl Oracle for StockfishOracle {
    async fn set_position(&mut self, position: &Position) -> Result<(), OracleError> {
        let (game, fen) = match position {
            Position::Moves(moves) => (Game::from_moves(moves.as_slice())?, None),
            Position::Fen { fen, moves } => {
                let mut game = Game::from_fen(fen)?;
                for mv in moves {
                    game.play_uci(mv)?;
                }
                (game, Some(fen.clone()))
            }
        };
        self.engine
            .send_command(EngineCommand::SetPosition {
                fen,
                moves: game.moves().to_vec(),
            })
            .await?;
        self.game = game;
        Ok(())
    }

    fn fen(&self) -> String {
        self.game.to_fen()
    }

    fn status(&self) -> PositionStatus {
        self.game.status()
    }

    fn side_to_move(&self) -> PieceColor {
        self.game.side_to_move()
    }

    fn is_legal(&self, mv: &str) -> bool {
        self.game.is_legal_uci(mv)
    }

    async fn best_move(&mut self, depth: u8) -> Result<Option<String>, OracleError> {
        if self.game.status() != PositionStatus::Ongoing {
            return Ok(None);
        }
        self.engine.sync().await?;
        let (mv, _) = self.engine.search(depth).await?;
        Ok(mv.map(format_uci_move))
    }

    async fn evaluate(&mut self, depth: u8) -> Result<Evaluation, OracleError> {
        if let Some(score) = terminal_score(self.game.status()) {
            return Ok(Evaluation { score, depth: 0 });
        }
        self.engine.sync().await?;
        let (_, info) = self.engine.search(depth).await?;
        let info = info.ok_or_else(|| {
            OracleError::Unavailable("engine finished search without a score".to_string())
        })?;
        let score = info.score.ok_or_else(|| {
            OracleError::Unavailable("engine info line without a score".to_string())
        })?;
        Ok(Evaluation {
            score,
            depth: info.depth.unwrap_or(depth),
        })
    }

    fn render(&self) -> String {
        chess::DisplayBoard::from_fen(&self.game.to_fen())
            .map(|board| board.render())
            .unwrap_or_default()
    }

    async fn set_skill_level(&mut self, level: u8) -> Result<(), OracleError> {
        self.engine
            .set_option("Skill Level", level.min(crate::MAX_SKILL_LEVEL).to_string())
            .await?;
        Ok(())
    }
}
