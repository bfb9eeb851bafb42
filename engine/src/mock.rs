//! Deterministic in-process oracle for tests.
//!
//! Positions are scored by material balance unless a score is scripted for
//! the exact FEN. The best move is the legal move that leaves the mover with
//! the most material, ties broken by UCI order, with checkmates first. A
//! scripted best move per FEN overrides the choice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chess::{AnalysisScore, DisplayBoard, Game, PieceColor, PieceKind, PositionStatus};

use crate::oracle::{terminal_score, Evaluation, Oracle, OracleError, Position};

#[derive(Debug, Clone, Default)]
pub struct MockOracle {
    game: Game,
    scores: HashMap<String, AnalysisScore>,
    best_moves: HashMap<String, String>,
    delay: Option<Duration>,
    unavailable: Arc<AtomicBool>,
    skill_level: Option<u8>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score, from the side to move's perspective, reported for `fen`.
    pub fn with_score(mut self, fen: impl Into<String>, score: AnalysisScore) -> Self {
        self.scores.insert(fen.into(), score);
        self
    }

    /// Best move reported for `fen`.
    pub fn with_best_move(mut self, fen: impl Into<String>, mv: impl Into<String>) -> Self {
        self.best_moves.insert(fen.into(), mv.into());
        self
    }

    /// Sleep this long inside every search call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Switch that makes every search call fail with `Unavailable` while set.
    /// Shared between clones, so a test can keep one after spawning.
    pub fn outage_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.unavailable)
    }

    pub fn skill_level(&self) -> Option<u8> {
        self.skill_level
    }

    /// The move [`Oracle::best_move`] would return for `position`.
    pub fn preferred_move(&self, position: &Position) -> Option<String> {
        let game = replay(position).ok()?;
        self.choose(&game)
    }

    fn choose(&self, game: &Game) -> Option<String> {
        if game.status() != PositionStatus::Ongoing {
            return None;
        }
        if let Some(mv) = self.best_moves.get(&game.to_fen()) {
            return Some(mv.clone());
        }

        let mover = game.side_to_move();
        let mut candidates = game.legal_moves_uci();
        candidates.sort();

        let mut best: Option<(i32, String)> = None;
        for mv in candidates {
            let mut next = game.clone();
            if next.play_uci(&mv).is_err() {
                continue;
            }
            let value = match next.status() {
                PositionStatus::Checkmate => i32::MAX,
                PositionStatus::Draw => 0,
                PositionStatus::Ongoing => material(&next.to_fen(), mover),
            };
            if best.as_ref().map_or(true, |(v, _)| value > *v) {
                best = Some((value, mv));
            }
        }
        best.map(|(_, mv)| mv)
    }

    async fn search_gate(&self) -> Result<(), OracleError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("mock outage".to_string()));
        }
        Ok(())
    }
}

fn replay(position: &Position) -> Result<Game, OracleError> {
    match position {
        Position::Moves(moves) => Ok(Game::from_moves(moves.as_slice())?),
        Position::Fen { fen, moves } => {
            let mut game = Game::from_fen(fen)?;
            for mv in moves {
                game.play_uci(mv)?;
            }
            Ok(game)
        }
    }
}

fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 100,
        PieceKind::Knight | PieceKind::Bishop => 300,
        PieceKind::Rook => 500,
        PieceKind::Queen => 900,
        PieceKind::King => 0,
    }
}

/// Material balance of `fen` from `side`'s point of view, in centipawns.
fn material(fen: &str, side: PieceColor) -> i32 {
    let Ok(board) = DisplayBoard::from_fen(fen) else {
        return 0;
    };
    let mut total = 0;
    for rank in 0..8 {
        for file in 0..8 {
            if let Some((kind, color)) = board.piece_at(file, rank) {
                let value = piece_value(kind);
                total += if color == side { value } else { -value };
            }
        }
    }
    total
}

impl Oracle for MockOracle {
    async fn set_position(&mut self, position: &Position) -> Result<(), OracleError> {
        self.game = replay(position)?;
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

    async fn best_move(&mut self, _depth: u8) -> Result<Option<String>, OracleError> {
        self.search_gate().await?;
        Ok(self.choose(&self.game))
    }

    async fn evaluate(&mut self, depth: u8) -> Result<Evaluation, OracleError> {
        self.search_gate().await?;
        if let Some(score) = terminal_score(self.game.status()) {
            return Ok(Evaluation { score, depth: 0 });
        }
        let fen = self.game.to_fen();
        let score = match self.scores.get(&fen) {
            Some(score) => *score,
            None => AnalysisScore::Centipawns(material(&fen, self.game.side_to_move())),
        };
        Ok(Evaluation { score, depth })
    }

    fn render(&self) -> String {
        DisplayBoard::from_fen(&self.game.to_fen())
            .map(|board| board.render())
            .unwrap_or_default()
    }

    async fn set_skill_level(&mut self, level: u8) -> Result<(), OracleError> {
        self.skill_level = Some(level);
        Ok(())
    }
}
