//! Serialized access to a single oracle.
//!
//! The oracle keeps its current position as internal state, so exactly one
//! task owns it. Callers hold a cloneable [`OracleHandle`] and send
//! self-contained requests (position + query); the actor sets the position
//! and answers each request before it takes the next one.

use std::time::Duration;

use chess::{PieceColor, PositionStatus};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::oracle::{Evaluation, Oracle, OracleError, Position, MAX_SKILL_LEVEL};

/// What the oracle reports about a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    pub fen: String,
    pub status: PositionStatus,
    pub side_to_move: PieceColor,
    pub rendering: String,
}

/// The three evaluations a played move is judged by, plus the oracle's own
/// choice. Every score is from the perspective of the side to move in the
/// position it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveAnalysis {
    pub best_move: Option<String>,
    pub before: Evaluation,
    pub after_played: Evaluation,
    /// `None` when the position before the move had no best move.
    pub after_best: Option<Evaluation>,
}

type Reply<T> = oneshot::Sender<Result<T, OracleError>>;

enum OracleCommand {
    Inspect {
        position: Position,
        reply: Reply<PositionInfo>,
    },
    IsLegal {
        position: Position,
        mv: String,
        reply: Reply<bool>,
    },
    BestMove {
        position: Position,
        depth: u8,
        skill_level: u8,
        reply: Reply<Option<String>>,
    },
    Evaluate {
        position: Position,
        depths: Vec<u8>,
        reply: Reply<Vec<Evaluation>>,
    },
    AnalyzeMove {
        position: Position,
        mv: String,
        depth: u8,
        reply: Reply<MoveAnalysis>,
    },
    Shutdown,
}

/// Cheap, cloneable handle to the oracle actor.
#[derive(Clone)]
pub struct OracleHandle {
    cmd_tx: mpsc::Sender<OracleCommand>,
    timeout: Duration,
}

/// Move `oracle` into its own task and return a handle to it. Every request
/// made through the handle fails with [`OracleError::Timeout`] if it is not
/// answered within `timeout`.
pub fn spawn_oracle<O: Oracle>(oracle: O, timeout: Duration) -> OracleHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    tokio::spawn(run_oracle_actor(oracle, cmd_rx));
    OracleHandle { cmd_tx, timeout }
}

async fn run_oracle_actor<O: Oracle>(oracle: O, cmd_rx: mpsc::Receiver<OracleCommand>) {
    run_oracle_actor_inner(oracle, cmd_rx)
        .instrument(tracing::info_span!("oracle"))
        .await;
}

async fn run_oracle_actor_inner<O: Oracle>(
    mut oracle: O,
    mut cmd_rx: mpsc::Receiver<OracleCommand>,
) {
    tracing::info!("Oracle actor started");
    let mut skill_level: Option<u8> = None;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            OracleCommand::Inspect { position, reply } => {
                let result = inspect(&mut oracle, &position).await;
                let _ = reply.send(result);
            }
            OracleCommand::IsLegal {
                position,
                mv,
                reply,
            } => {
                let result = oracle
                    .set_position(&position)
                    .await
                    .map(|()| oracle.is_legal(&mv));
                let _ = reply.send(result);
            }
            OracleCommand::BestMove {
                position,
                depth,
                skill_level: level,
                reply,
            } => {
                let result = async {
                    ensure_skill(&mut oracle, &mut skill_level, level).await?;
                    oracle.set_position(&position).await?;
                    oracle.best_move(depth).await
                }
                .await;
                let _ = reply.send(result);
            }
            OracleCommand::Evaluate {
                position,
                depths,
                reply,
            } => {
                let result = async {
                    ensure_skill(&mut oracle, &mut skill_level, MAX_SKILL_LEVEL).await?;
                    oracle.set_position(&position).await?;
                    let mut evaluations = Vec::with_capacity(depths.len());
                    for depth in depths {
                        evaluations.push(oracle.evaluate(depth).await?);
                    }
                    Ok::<_, OracleError>(evaluations)
                }
                .await;
                let _ = reply.send(result);
            }
            OracleCommand::AnalyzeMove {
                position,
                mv,
                depth,
                reply,
            } => {
                let result = async {
                    ensure_skill(&mut oracle, &mut skill_level, MAX_SKILL_LEVEL).await?;
                    analyze_move(&mut oracle, &position, &mv, depth).await
                }
                .await;
                let _ = reply.send(result);
            }
            OracleCommand::Shutdown => break,
        }
    }

    tracing::info!("Oracle actor exited");
}

async fn ensure_skill<O: Oracle>(
    oracle: &mut O,
    current: &mut Option<u8>,
    wanted: u8,
) -> Result<(), OracleError> {
    if *current != Some(wanted) {
        oracle.set_skill_level(wanted).await?;
        *current = Some(wanted);
    }
    Ok(())
}

async fn inspect<O: Oracle>(oracle: &mut O, position: &Position) -> Result<PositionInfo, OracleError> {
    oracle.set_position(position).await?;
    Ok(PositionInfo {
        fen: oracle.fen(),
        status: oracle.status(),
        side_to_move: oracle.side_to_move(),
        rendering: oracle.render(),
    })
}

#[tracing::instrument(level = "debug", skip(oracle, position), fields(ply = position.ply_count()))]
async fn analyze_move<O: Oracle>(
    oracle: &mut O,
    position: &Position,
    mv: &str,
    depth: u8,
) -> Result<MoveAnalysis, OracleError> {
    oracle.set_position(position).await?;
    if !oracle.is_legal(mv) {
        return Err(OracleError::InvalidPosition(format!(
            "{} is not legal at ply {}",
            mv,
            position.ply_count()
        )));
    }
    let best_move = oracle.best_move(depth).await?;
    let before = oracle.evaluate(depth).await?;

    oracle.set_position(&position.with_move(mv)).await?;
    let after_played = oracle.evaluate(depth).await?;

    let after_best = match &best_move {
        Some(best) if best == mv => Some(after_played),
        Some(best) => {
            oracle.set_position(&position.with_move(best)).await?;
            Some(oracle.evaluate(depth).await?)
        }
        None => None,
    };

    Ok(MoveAnalysis {
        best_move,
        before,
        after_played,
        after_best,
    })
}

impl OracleHandle {
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// FEN, terminal status, side to move and rendering of `position`.
    pub async fn inspect(&self, position: Position) -> Result<PositionInfo, OracleError> {
        self.request(self.timeout, |reply| OracleCommand::Inspect { position, reply })
            .await
    }

    pub async fn is_legal(&self, position: Position, mv: &str) -> Result<bool, OracleError> {
        let mv = mv.to_string();
        self.request(self.timeout, |reply| OracleCommand::IsLegal {
            position,
            mv,
            reply,
        })
        .await
    }

    /// Best move at `depth`, searched at the given skill level.
    pub async fn best_move(
        &self,
        position: Position,
        depth: u8,
        skill_level: u8,
    ) -> Result<Option<String>, OracleError> {
        self.request(self.timeout, |reply| OracleCommand::BestMove {
            position,
            depth,
            skill_level,
            reply,
        })
        .await
    }

    pub async fn evaluate(&self, position: Position, depth: u8) -> Result<Evaluation, OracleError> {
        let mut evaluations = self.evaluate_depths(position, vec![depth]).await?;
        evaluations
            .pop()
            .ok_or_else(|| OracleError::Unavailable("empty evaluation reply".to_string()))
    }

    /// One evaluation per depth, in the order given, without another request
    /// touching the oracle in between. The timeout scales with the number of
    /// depths.
    pub async fn evaluate_depths(
        &self,
        position: Position,
        depths: Vec<u8>,
    ) -> Result<Vec<Evaluation>, OracleError> {
        let timeout = self.timeout * depths.len().max(1) as u32;
        self.request(timeout, |reply| OracleCommand::Evaluate {
            position,
            depths,
            reply,
        })
        .await
    }

    /// Best move plus the before / after-played / after-best evaluations for
    /// `mv` played from `position`.
    pub async fn analyze_move(
        &self,
        position: Position,
        mv: &str,
        depth: u8,
    ) -> Result<MoveAnalysis, OracleError> {
        let mv = mv.to_string();
        self.request(self.timeout * 4, |reply| OracleCommand::AnalyzeMove {
            position,
            mv,
            depth,
            reply,
        })
        .await
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(OracleCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        timeout: Duration,
        make: impl FnOnce(Reply<T>) -> OracleCommand,
    ) -> Result<T, OracleError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| OracleError::Unavailable("oracle actor closed".into()))?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(OracleError::Unavailable("reply dropped".into())),
            Err(_) => {
                tracing::warn!(?timeout, "Oracle request timed out");
                Err(OracleError::Timeout(timeout))
            }
        }
    }
}
