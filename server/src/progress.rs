//! How a player's latest finished game compares with the ones before it.
//!
//! Built on the per-player ring buffer of game summaries, which holds the
//! most recent finished games.

use serde::Serialize;

use crate::persistence::{GameSummary, Persistence, PersistenceError, SummaryRepository};

/// Direction of a player's play between the older games and the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Steady,
    Declining,
    /// Only one finished game so far.
    FirstGame,
}

/// Shares below this size are treated as noise.
const TREND_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub latest: GameSummary,
    /// Older games the latest one is compared with, newest first.
    pub previous: Vec<GameSummary>,
    /// Share of the latest game's moves labelled Brilliant or Good.
    pub latest_accuracy: f64,
    pub latest_blunder_rate: f64,
    /// Averages over `previous`; `None` when there are no previous games.
    pub previous_accuracy: Option<f64>,
    pub previous_blunder_rate: Option<f64>,
    pub trend: Trend,
}

fn accuracy(summary: &GameSummary) -> f64 {
    share(summary.brilliant + summary.good, summary.player_moves)
}

fn blunder_rate(summary: &GameSummary) -> f64 {
    share(summary.blunder, summary.player_moves)
}

fn share(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(total)
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> Option<f64> {
    let n = values.len();
    (n > 0).then(|| values.sum::<f64>() / n as f64)
}

/// Compare the newest of `summaries` (newest first) with the rest.
pub fn compare(summaries: &[GameSummary]) -> Option<ProgressReport> {
    let (latest, previous) = summaries.split_first()?;
    let latest_accuracy = accuracy(latest);
    let latest_blunder_rate = blunder_rate(latest);
    let previous_accuracy = mean(previous.iter().map(accuracy));
    let previous_blunder_rate = mean(previous.iter().map(blunder_rate));

    let trend = match (previous_accuracy, previous_blunder_rate) {
        (Some(acc), Some(blunders)) => {
            let score = (latest_accuracy - acc) - (latest_blunder_rate - blunders);
            if score > TREND_THRESHOLD {
                Trend::Improving
            } else if score < -TREND_THRESHOLD {
                Trend::Declining
            } else {
                Trend::Steady
            }
        }
        _ => Trend::FirstGame,
    };

    Some(ProgressReport {
        latest: latest.clone(),
        previous: previous.to_vec(),
        latest_accuracy,
        latest_blunder_rate,
        previous_accuracy,
        previous_blunder_rate,
        trend,
    })
}

/// The player's recent finished games, newest first.
pub async fn recent_games<D: Persistence>(
    store: &D,
    player_id: &str,
) -> Result<Vec<GameSummary>, PersistenceError> {
    store.summaries().recent_summaries(player_id).await
}

/// `None` until the player has finished a game.
pub async fn progress_report<D: Persistence>(
    store: &D,
    player_id: &str,
) -> Result<Option<ProgressReport>, PersistenceError> {
    Ok(compare(&recent_games(store, player_id).await?))
}
