//! Background position evaluation.
//!
//! After every move the session schedules its game here. A single worker
//! drains the queue: it replays the game's ledger into the oracle, searches
//! each configured depth in turn, keeps one evaluation according to the
//! [`RetentionStrategy`] and upserts it as the game's live evaluation.
//!
//! A game already waiting in the queue is not queued twice. The worker takes
//! it off the pending set when its pass starts and reads the ledger at that
//! moment, so a pass always sees every move made before it began.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use chess::{Game, PieceColor};
use engine::{Evaluation, OracleHandle, Position};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

use crate::persistence::{
    now_timestamp, EvaluationRepository, MoveRepository, Persistence, PersistenceError,
    PositionEvaluation,
};

/// Which of the per-depth evaluations becomes the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionStrategy {
    /// Largest absolute score seen. A deeper result replaces the kept one
    /// only if it is strictly larger in magnitude.
    #[default]
    LargestMagnitude,
    /// The deepest search.
    Deepest,
}

impl RetentionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LargestMagnitude => "largest-magnitude",
            Self::Deepest => "deepest",
        }
    }
}

impl FromStr for RetentionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "largest-magnitude" | "largest" => Ok(Self::LargestMagnitude),
            "deepest" => Ok(Self::Deepest),
            other => Err(format!(
                "unknown evaluation strategy {other:?} (expected largest-magnitude or deepest)"
            )),
        }
    }
}

/// Keep one of `evaluations` (given in search order) per `strategy`.
pub fn select_evaluation(
    evaluations: &[Evaluation],
    strategy: RetentionStrategy,
) -> Option<Evaluation> {
    match strategy {
        RetentionStrategy::Deepest => evaluations.last().copied(),
        RetentionStrategy::LargestMagnitude => {
            let mut kept: Option<Evaluation> = None;
            for eval in evaluations {
                let larger = kept.map_or(true, |k| {
                    eval.score.to_cp().unsigned_abs() > k.score.to_cp().unsigned_abs()
                });
                if larger {
                    kept = Some(*eval);
                }
            }
            kept
        }
    }
}

/// Configuration for the position evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Depths searched, ascending.
    pub depths: Vec<u8>,
    pub strategy: RetentionStrategy,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            depths: (8..=12).collect(),
            strategy: RetentionStrategy::default(),
        }
    }
}

/// Reported once per finished pass.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatorEvent {
    Updated(PositionEvaluation),
    Failed { game_id: String, error: String },
}

/// Handle to the evaluation worker.
pub struct Evaluator {
    job_tx: mpsc::Sender<String>,
    pending: Arc<RwLock<HashSet<String>>>,
    event_tx: broadcast::Sender<EvaluatorEvent>,
}

impl Evaluator {
    /// Spawn the worker. It exits when the evaluator is dropped.
    pub fn spawn<D: Persistence>(store: Arc<D>, oracle: OracleHandle, config: EvaluatorConfig) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<String>(256);
        let (event_tx, _) = broadcast::channel(64);
        let pending = Arc::new(RwLock::new(HashSet::new()));

        tracing::info!(
            depths = ?config.depths,
            strategy = config.strategy.as_str(),
            "Position evaluator initialized"
        );

        tokio::spawn(run_evaluation_worker(
            0,
            Arc::new(Mutex::new(job_rx)),
            store,
            oracle,
            config,
            pending.clone(),
            event_tx.clone(),
        ));

        Self {
            job_tx,
            pending,
            event_tx,
        }
    }

    /// Queue a pass for `game_id`. Returns `false` if one is already waiting.
    pub async fn schedule(&self, game_id: &str) -> bool {
        {
            let mut pending = self.pending.write().await;
            if !pending.insert(game_id.to_string()) {
                tracing::debug!(game_id, "Evaluation already pending");
                return false;
            }
        }

        if self.job_tx.send(game_id.to_string()).await.is_err() {
            tracing::warn!(game_id, "Evaluation worker is gone");
            self.pending.write().await.remove(game_id);
            return false;
        }
        tracing::debug!(game_id, "Evaluation scheduled");
        true
    }

    #[cfg(test)]
    pub async fn is_pending(&self, game_id: &str) -> bool {
        self.pending.read().await.contains(game_id)
    }

    /// Events for every pass that finishes after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EvaluatorEvent> {
        self.event_tx.subscribe()
    }
}

async fn run_evaluation_worker<D: Persistence>(
    worker_id: usize,
    job_rx: Arc<Mutex<mpsc::Receiver<String>>>,
    store: Arc<D>,
    oracle: OracleHandle,
    config: EvaluatorConfig,
    pending: Arc<RwLock<HashSet<String>>>,
    event_tx: broadcast::Sender<EvaluatorEvent>,
) {
    tracing::info!(worker_id, "Evaluation worker started");

    loop {
        let game_id = {
            let mut rx = job_rx.lock().await;
            match rx.recv().await {
                Some(game_id) => game_id,
                None => {
                    tracing::info!(worker_id, "Job channel closed, worker exiting");
                    break;
                }
            }
        };

        // Moves made from here on get a pass of their own.
        pending.write().await.remove(&game_id);

        let event = match evaluate_game(store.as_ref(), &oracle, &config, &game_id).await {
            Ok(evaluation) => {
                tracing::info!(
                    worker_id,
                    game_id = %game_id,
                    ply = evaluation.ply_count,
                    depth = evaluation.depth,
                    white = evaluation.win_probability_white,
                    "Evaluation updated"
                );
                EvaluatorEvent::Updated(evaluation)
            }
            Err(e) => {
                tracing::warn!(worker_id, game_id = %game_id, "Evaluation failed: {}", e);
                EvaluatorEvent::Failed {
                    game_id,
                    error: e.to_string(),
                }
            }
        };
        let _ = event_tx.send(event);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Oracle(#[from] engine::OracleError),
    #[error("ledger does not replay: {0}")]
    Ledger(#[from] chess::GameError),
    #[error("game {0} has no ledger")]
    EmptyLedger(String),
    #[error("oracle returned no evaluation")]
    NoEvaluation,
}

/// Run one evaluation pass for `game_id` and store the result.
pub async fn evaluate_game<D: Persistence>(
    store: &D,
    oracle: &OracleHandle,
    config: &EvaluatorConfig,
    game_id: &str,
) -> Result<PositionEvaluation, EvaluationError> {
    let ledger = store.moves().list_moves(game_id).await?;
    if ledger.is_empty() {
        return Err(EvaluationError::EmptyLedger(game_id.to_string()));
    }
    let moves: Vec<String> = ledger
        .iter()
        .filter(|m| !m.is_initial())
        .map(|m| m.notation.clone())
        .collect();
    let side_to_move = Game::from_moves(moves.as_slice())?.side_to_move();
    let ply_count = moves.len() as u32;

    let evaluations = oracle
        .evaluate_depths(Position::Moves(moves), config.depths.clone())
        .await?;
    let kept = select_evaluation(&evaluations, config.strategy).ok_or(EvaluationError::NoEvaluation)?;

    let odds = kept.score.win_probability(side_to_move);
    let evaluation = PositionEvaluation {
        game_id: game_id.to_string(),
        score: kept.score.for_side(side_to_move, PieceColor::White),
        depth: kept.depth,
        win_probability_white: odds.white,
        win_probability_black: odds.black,
        ply_count,
        updated_at: now_timestamp(),
    };
    store.evaluations().upsert_evaluation(&evaluation).await?;
    Ok(evaluation)
}
