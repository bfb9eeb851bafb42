//! Skill rating derived from replaying a game's player moves.
//!
//! Every player move is judged against the oracle's best move and how much
//! evaluation it gave away. The adjustments are summed onto the player's
//! current rating; the size of the gain decides a tiered increment that is
//! added to the stored rating. Ratings never go down.

use std::sync::Arc;

use engine::{OracleHandle, Position};
use serde::{Deserialize, Serialize};

use super::classifier::mover_cp_after;
use crate::persistence::{
    GameRecord, GameRepository, MoveRepository, Mover, Persistence, PlayerFilter,
    PlayerRepository,
};
use crate::session::SessionError;

/// Adjustment for a single player move.
///
/// `eval_diff` is how many centipawns the move gave away from the mover's
/// point of view (before minus after).
pub fn move_adjustment(is_best_move: bool, eval_diff: i32) -> i64 {
    if is_best_move {
        50
    } else if eval_diff > 200 {
        -50
    } else if eval_diff > 100 {
        -20
    } else if eval_diff > 30 {
        -5
    } else {
        5
    }
}

/// Sum `adjustments` onto `start`. The running total may dip below zero;
/// only the final value is floored.
pub fn accumulate(start: u32, adjustments: impl IntoIterator<Item = i64>) -> u32 {
    let total = adjustments
        .into_iter()
        .fold(i64::from(start), |acc, adj| acc + adj);
    total.clamp(0, i64::from(u32::MAX)) as u32
}

/// Increment applied to the stored rating for a replay gain of `delta`.
pub fn rating_increment(delta: i64) -> u32 {
    match delta {
        d if d >= 200 => 100,
        d if d >= 100 => 70,
        d if d >= 20 => 50,
        d if d > 0 => 20,
        _ => 0,
    }
}

/// Result of a rating refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingOutcome {
    pub player_id: String,
    pub game_id: String,
    /// Accumulator after the replay.
    pub final_rating: u32,
    /// `final_rating` minus the rating the replay started from.
    pub rating_delta: i64,
    pub moves_analyzed: u32,
    /// Amount added to the stored rating.
    pub increment: u32,
    /// Stored rating after the update.
    pub rating: u32,
}

/// Replays games against the oracle and updates player ratings.
pub struct RatingEngine<D: Persistence> {
    store: Arc<D>,
    oracle: OracleHandle,
    depth: u8,
}

impl<D: Persistence> RatingEngine<D> {
    pub fn new(store: Arc<D>, oracle: OracleHandle, depth: u8) -> Self {
        Self {
            store,
            oracle,
            depth,
        }
    }

    /// Rate `player_id` on `game_id`, or by default on their game in
    /// progress, else their most recent game.
    #[tracing::instrument(skip(self), fields(depth = self.depth))]
    pub async fn refresh(
        &self,
        player_id: &str,
        game_id: Option<&str>,
    ) -> Result<RatingOutcome, SessionError> {
        let player = self
            .store
            .players()
            .find_player(&PlayerFilter::by_id(player_id))
            .await?
            .ok_or_else(|| SessionError::NotFound(format!("player {player_id}")))?;

        let game = self.target_game(player_id, game_id).await?;
        let ledger = self.store.moves().list_moves(&game.id).await?;

        let mut played: Vec<String> = Vec::new();
        let mut adjustments = Vec::new();
        for record in ledger.iter().filter(|m| !m.is_initial()) {
            if record.mover == Mover::Player {
                let position = Position::Moves(played.clone());
                let analysis = self
                    .oracle
                    .analyze_move(position, &record.notation, self.depth)
                    .await?;

                let eval_before = analysis.before.score.to_cp();
                let eval_after = mover_cp_after(&analysis.after_played.score);
                let is_best = analysis.best_move.as_deref() == Some(record.notation.as_str());
                let adjustment = move_adjustment(is_best, eval_before - eval_after);
                tracing::debug!(
                    ply = played.len() + 1,
                    mv = %record.notation,
                    is_best,
                    eval_before,
                    eval_after,
                    adjustment,
                    "Rated move"
                );
                adjustments.push(adjustment);
            }
            played.push(record.notation.clone());
        }

        if adjustments.is_empty() {
            return Err(SessionError::NoMoves(format!(
                "game {} has no player moves",
                game.id
            )));
        }

        let moves_analyzed = adjustments.len() as u32;
        let final_rating = accumulate(player.rating, adjustments);
        let rating_delta = i64::from(final_rating) - i64::from(player.rating);
        let increment = rating_increment(rating_delta);
        let rating = if increment > 0 {
            self.store.players().add_rating(player_id, increment).await?
        } else {
            player.rating
        };

        tracing::info!(
            player_id,
            game_id = %game.id,
            moves_analyzed,
            rating_delta,
            increment,
            rating,
            "Rating refreshed"
        );

        Ok(RatingOutcome {
            player_id: player_id.to_string(),
            game_id: game.id,
            final_rating,
            rating_delta,
            moves_analyzed,
            increment,
            rating,
        })
    }

    async fn target_game(
        &self,
        player_id: &str,
        game_id: Option<&str>,
    ) -> Result<GameRecord, SessionError> {
        let games = self.store.games();
        match game_id {
            Some(id) => {
                let game = games
                    .load_game(id)
                    .await?
                    .ok_or_else(|| SessionError::NotFound(format!("game {id}")))?;
                if game.player_id != player_id {
                    return Err(SessionError::NotFound(format!(
                        "game {id} of player {player_id}"
                    )));
                }
                Ok(game)
            }
            None => match games.active_game(player_id).await? {
                Some(game) => Ok(game),
                None => games.latest_game(player_id).await?.ok_or_else(|| {
                    SessionError::NoMoves(format!("player {player_id} has no games"))
                }),
            },
        }
    }
}
