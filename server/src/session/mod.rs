//! Game sessions: the human (White) against the oracle.
//!
//! A session is an IN_PROGRESS game plus its append-only move ledger. Every
//! player move is checked against the oracle, classified, recorded, answered
//! by the oracle and recorded again, with a terminal check after each half.
//! Moves on one session are applied one at a time; the position evaluator is
//! scheduled after each of them.

pub mod difficulty;
pub mod error;
pub mod opening_book;
pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use chess::{Capture, DisplayBoard, Game, PositionStatus, STARTING_FEN};
use engine::{OracleHandle, Position, PositionInfo};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::analysis::{classify, Evaluator, MoveQuality, RatingEngine, RatingOutcome};
use crate::persistence::{
    generate_id, now_timestamp, EvaluationRepository, GameRecord, GameRepository, GameStatus,
    GameSummary, MoveRecord, MoveRepository, Mover, Persistence, PersistenceError,
    PlayerFilter, PlayerRepository, PositionEvaluation,
};
pub use difficulty::Difficulty;
pub use error::SessionError;
pub use opening_book::OpeningBook;
pub use snapshot::{BoardView, EvaluationView, MoveOutcome, PlayedMove, SessionStart, SessionView};

/// Knobs for move handling.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Depth used to classify and rate player moves.
    pub analysis_depth: u8,
    pub opening_book: OpeningBook,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analysis_depth: 12,
            opening_book: OpeningBook::new(),
        }
    }
}

/// Owns the session lifecycle on top of the store and the oracle.
pub struct SessionManager<D: Persistence> {
    store: Arc<D>,
    oracle: OracleHandle,
    evaluator: Evaluator,
    rating: RatingEngine<D>,
    config: SessionConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<D: Persistence> SessionManager<D> {
    pub fn new(
        store: Arc<D>,
        oracle: OracleHandle,
        evaluator: Evaluator,
        config: SessionConfig,
    ) -> Self {
        let rating = RatingEngine::new(store.clone(), oracle.clone(), config.analysis_depth);
        Self {
            store,
            oracle,
            evaluator,
            rating,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Start a new game for `player_id` from the standard position.
    #[tracing::instrument(skip(self))]
    pub async fn start_session(
        &self,
        player_id: &str,
        difficulty: Difficulty,
    ) -> Result<SessionStart, SessionError> {
        self.store
            .players()
            .find_player(&PlayerFilter::by_id(player_id))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("player {player_id}")))?;

        if let Some(active) = self.store.games().active_game(player_id).await? {
            return Err(SessionError::Conflict(format!(
                "player {player_id} already has game {} in progress",
                active.id
            )));
        }

        let now = now_timestamp();
        let game = GameRecord {
            id: generate_id(),
            player_id: player_id.to_string(),
            status: GameStatus::InProgress,
            difficulty,
            started_at: now,
            ended_at: None,
        };
        self.store
            .games()
            .create_game(
                &game,
                &MoveRecord::initial(&game.id, STARTING_FEN, now),
                &PositionEvaluation::initial(&game.id, now),
            )
            .await?;

        tracing::info!(game_id = %game.id, %difficulty, "Session started");
        Ok(SessionStart {
            game,
            fen: STARTING_FEN.to_string(),
            rendering: render_fen(STARTING_FEN),
        })
    }

    /// Apply the player's move and the oracle's reply.
    #[tracing::instrument(skip(self))]
    pub async fn apply_player_move(
        &self,
        game_id: &str,
        notation: &str,
    ) -> Result<MoveOutcome, SessionError> {
        let (_guard, game) = self.lock_active_game(game_id).await?;

        let mut ledger = self.store.moves().list_moves(game_id).await?;
        if ledger.last().is_some_and(|m| m.mover == Mover::Player) {
            // An earlier reply never made it into the ledger.
            tracing::warn!(game_id, "Completing pending oracle reply");
            let (reply, info) = self.oracle_reply(&game, &ledger).await?;
            ledger.push(reply);
            if let Some(status) = terminal_status(info.status, Mover::Oracle) {
                self.finalize(&game, status).await;
                self.evaluator.schedule(game_id).await;
                return Err(SessionError::NoActiveSession(format!(
                    "game {game_id} ended on the pending reply ({status})"
                )));
            }
        }

        let notation = notation.trim().to_ascii_lowercase();
        let position = ledger_position(&ledger);
        if !self.oracle.is_legal(position.clone(), &notation).await? {
            return Err(SessionError::InvalidMove(format!(
                "{notation} is not legal at ply {}",
                position.ply_count()
            )));
        }

        let analysis = self
            .oracle
            .analyze_move(position.clone(), &notation, self.config.analysis_depth)
            .await?;
        let quality = classify(&analysis);

        let info = self.oracle.inspect(position.with_move(&notation)).await?;
        let record = self
            .append(&ledger, Mover::Player, &notation, &info, Some(quality))
            .await?;
        tracing::info!(
            game_id,
            ply = record.seq,
            mv = %notation,
            %quality,
            "Player move applied"
        );
        let player_move = played(&record);
        ledger.push(record);

        let (oracle_move, status, info) = match terminal_status(info.status, Mover::Player) {
            Some(status) => (None, status, info),
            None => {
                let (record, info) = self.oracle_reply(&game, &ledger).await?;
                let reply = played(&record);
                let status =
                    terminal_status(info.status, Mover::Oracle).unwrap_or(GameStatus::InProgress);
                (Some(reply), status, info)
            }
        };

        let rating = if status.is_terminal() {
            self.finalize(&game, status).await
        } else {
            None
        };
        self.evaluator.schedule(game_id).await;

        Ok(MoveOutcome {
            game_id: game_id.to_string(),
            player_move,
            oracle_move,
            status,
            fen: info.fen,
            rendering: info.rendering,
            rating,
        })
    }

    /// The game record, full ledger and current board.
    pub async fn load_session(&self, game_id: &str) -> Result<SessionView, SessionError> {
        let game = self.load_game(game_id).await?;
        let moves = self.store.moves().list_moves(game_id).await?;
        let fen = moves
            .last()
            .map_or_else(|| STARTING_FEN.to_string(), |m| m.fen_after.clone());
        Ok(SessionView {
            rendering: render_fen(&fen),
            game,
            moves,
            fen,
        })
    }

    /// The board after the first `ply` moves, clamped to the moves played.
    pub async fn board_at(&self, game_id: &str, ply: usize) -> Result<BoardView, SessionError> {
        self.load_game(game_id).await?;
        let moves: Vec<String> = self
            .store
            .moves()
            .list_moves(game_id)
            .await?
            .into_iter()
            .filter(|m| !m.is_initial())
            .map(|m| m.notation)
            .collect();
        let ply = ply.min(moves.len());
        let game = Game::from_moves(&moves[..ply]).map_err(|e| {
            PersistenceError::Corrupt(format!("ledger of game {game_id} does not replay: {e}"))
        })?;
        let fen = game.to_fen();
        Ok(BoardView {
            game_id: game_id.to_string(),
            ply,
            rendering: render_fen(&fen),
            fen,
        })
    }

    /// The player's game in progress.
    pub async fn active_session(&self, player_id: &str) -> Result<GameRecord, SessionError> {
        self.store
            .games()
            .active_game(player_id)
            .await?
            .ok_or_else(|| SessionError::NoActiveSession(format!("player {player_id}")))
    }

    /// The ledger without its initial record.
    pub async fn move_history(&self, game_id: &str) -> Result<Vec<MoveRecord>, SessionError> {
        self.load_game(game_id).await?;
        let moves: Vec<MoveRecord> = self
            .store
            .moves()
            .list_moves(game_id)
            .await?
            .into_iter()
            .filter(|m| !m.is_initial())
            .collect();
        if moves.is_empty() {
            return Err(SessionError::NoMoves(format!("game {game_id}")));
        }
        Ok(moves)
    }

    /// The stored evaluation. It may trail the ledger right after a move.
    pub async fn current_evaluation(&self, game_id: &str) -> Result<EvaluationView, SessionError> {
        let game = self.load_game(game_id).await?;
        let evaluation = self
            .store
            .evaluations()
            .load_evaluation(game_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("evaluation of game {game_id}")))?;
        let played = self
            .store
            .moves()
            .list_moves(game_id)
            .await?
            .iter()
            .filter(|m| !m.is_initial())
            .count() as u32;
        Ok(EvaluationView {
            status: game.status,
            stale: evaluation.ply_count < played,
            evaluation,
        })
    }

    /// Concede the game to the oracle.
    #[tracing::instrument(skip(self))]
    pub async fn resign(&self, game_id: &str) -> Result<Option<RatingOutcome>, SessionError> {
        let (_guard, game) = self.lock_active_game(game_id).await?;
        tracing::info!(game_id, "Player resigned");
        let rating = self.finalize(&game, GameStatus::AiWin).await;
        self.evaluator.schedule(game_id).await;
        Ok(rating)
    }

    /// Replay a game and update the player's rating.
    pub async fn refresh_rating(
        &self,
        player_id: &str,
        game_id: Option<&str>,
    ) -> Result<RatingOutcome, SessionError> {
        self.rating.refresh(player_id, game_id).await
    }

    /// Lock an IN_PROGRESS game for one move or a resignation.
    ///
    /// Unknown and finished games are turned away before a lock entry is
    /// created. The status is read again once the lock is held.
    async fn lock_active_game(
        &self,
        game_id: &str,
    ) -> Result<(OwnedMutexGuard<()>, GameRecord), SessionError> {
        ensure_in_progress(self.load_game(game_id).await?)?;
        let guard = self.session_lock(game_id).await.lock_owned().await;
        match self.load_game(game_id).await.and_then(ensure_in_progress) {
            Ok(game) => Ok((guard, game)),
            Err(e) => {
                drop(guard);
                self.locks.lock().await.remove(game_id);
                Err(e)
            }
        }
    }

    async fn load_game(&self, game_id: &str) -> Result<GameRecord, SessionError> {
        self.store
            .games()
            .load_game(game_id)
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("game {game_id}")))
    }

    async fn session_lock(&self, game_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(game_id.to_string())
            .or_default()
            .clone()
    }

    /// Pick, apply and record the oracle's reply to the last ledger move.
    async fn oracle_reply(
        &self,
        game: &GameRecord,
        ledger: &[MoveRecord],
    ) -> Result<(MoveRecord, PositionInfo), SessionError> {
        let position = ledger_position(ledger);
        let ply = position.ply_count();

        let mut reply = None;
        if let Some(book_move) = self.config.opening_book.reply_at(ply) {
            if self.oracle.is_legal(position.clone(), book_move).await? {
                tracing::debug!(game_id = %game.id, ply, mv = book_move, "Opening book reply");
                reply = Some(book_move.to_string());
            } else {
                tracing::warn!(game_id = %game.id, ply, mv = book_move, "Opening book move is illegal here");
            }
        }
        let reply = match reply {
            Some(mv) => mv,
            None => self
                .oracle
                .best_move(
                    position.clone(),
                    game.difficulty.depth(),
                    game.difficulty.skill_level(),
                )
                .await?
                .ok_or_else(|| {
                    SessionError::OracleUnavailable(format!("no reply at ply {ply}"))
                })?,
        };

        let info = self.oracle.inspect(position.with_move(&reply)).await?;
        let record = self.append(ledger, Mover::Oracle, &reply, &info, None).await?;
        tracing::info!(game_id = %game.id, ply = record.seq, mv = %reply, "Oracle replied");
        Ok((record, info))
    }

    async fn append(
        &self,
        ledger: &[MoveRecord],
        mover: Mover,
        notation: &str,
        info: &PositionInfo,
        quality: Option<MoveQuality>,
    ) -> Result<MoveRecord, SessionError> {
        let (seq, capture) = match ledger.last() {
            Some(prev) => (
                prev.seq + 1,
                capture_between(&prev.fen_after, &info.fen, notation),
            ),
            None => (1, None),
        };
        let game_id = ledger
            .first()
            .map(|m| m.game_id.clone())
            .ok_or_else(|| PersistenceError::Corrupt("empty ledger".to_string()))?;

        let record = MoveRecord {
            game_id,
            seq,
            mover,
            notation: notation.to_string(),
            fen_after: info.fen.clone(),
            quality,
            capture,
            created_at: now_timestamp(),
        };
        self.store.moves().append_move(&record).await?;
        Ok(record)
    }

    /// Close the game and refresh the player's rating. Rating failures are
    /// logged; the game stays closed either way.
    async fn finalize(&self, game: &GameRecord, status: GameStatus) -> Option<RatingOutcome> {
        match self.close_game(game, status).await {
            Ok(true) => tracing::info!(game_id = %game.id, %status, "Game over"),
            Ok(false) => {
                tracing::warn!(game_id = %game.id, "Game was already closed");
                return None;
            }
            Err(e) => {
                tracing::error!(game_id = %game.id, "Failed to close game: {}", e);
                return None;
            }
        }
        self.locks.lock().await.remove(&game.id);

        match self.rating.refresh(&game.player_id, Some(&game.id)).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(game_id = %game.id, "Rating refresh failed: {}", e);
                None
            }
        }
    }

    async fn close_game(&self, game: &GameRecord, status: GameStatus) -> Result<bool, PersistenceError> {
        let ledger = self.store.moves().list_moves(&game.id).await?;
        let summary = GameSummary::from_ledger(game, status, &ledger, now_timestamp());
        self.store.games().finish_game(&summary).await
    }
}

fn ledger_position(ledger: &[MoveRecord]) -> Position {
    Position::Moves(
        ledger
            .iter()
            .filter(|m| !m.is_initial())
            .map(|m| m.notation.clone())
            .collect(),
    )
}

fn ensure_in_progress(game: GameRecord) -> Result<GameRecord, SessionError> {
    if game.status.is_terminal() {
        return Err(SessionError::NoActiveSession(format!(
            "game {} is over ({})",
            game.id, game.status
        )));
    }
    Ok(game)
}

fn terminal_status(status: PositionStatus, mover: Mover) -> Option<GameStatus> {
    match (status, mover) {
        (PositionStatus::Ongoing, _) => None,
        (PositionStatus::Draw, _) => Some(GameStatus::Draw),
        (PositionStatus::Checkmate, Mover::Player) => Some(GameStatus::PlayerWin),
        (PositionStatus::Checkmate, _) => Some(GameStatus::AiWin),
    }
}

fn played(record: &MoveRecord) -> PlayedMove {
    PlayedMove {
        notation: record.notation.clone(),
        fen_after: record.fen_after.clone(),
        capture: record.capture,
        quality: record.quality,
    }
}

fn capture_between(before: &str, after: &str, notation: &str) -> Option<Capture> {
    let before = DisplayBoard::from_fen(before).ok()?;
    let after = DisplayBoard::from_fen(after).ok()?;
    before.detect_capture(&after, notation)
}

pub(crate) fn render_fen(fen: &str) -> String {
    DisplayBoard::from_fen(fen)
        .map(|board| board.render())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests;
