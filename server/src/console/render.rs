//! Text and JSON renderings of console replies.

use std::fmt::Write as _;

use serde::Serialize;

use super::{ConsoleError, Reply};
use crate::persistence::{GameSummary, MoveRecord, Mover, Player};
use crate::progress::{ProgressReport, Trend};
use crate::session::PlayedMove;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

pub fn reply(format: OutputFormat, reply: &Reply) -> String {
    match format {
        OutputFormat::Text => text(reply),
        OutputFormat::Json => serde_json::to_string(reply)
            .unwrap_or_else(|e| json_error("serialization", e.to_string())),
    }
}

pub fn error(format: OutputFormat, err: &ConsoleError) -> String {
    match format {
        OutputFormat::Text => format!("error: {err}"),
        OutputFormat::Json => json_error(err.kind(), err.to_string()),
    }
}

fn json_error(kind: &str, message: String) -> String {
    serde_json::to_string(&ErrorBody {
        error: kind,
        message,
    })
    .unwrap_or_else(|_| format!("{{\"error\":\"{kind}\"}}"))
}

fn text(reply: &Reply) -> String {
    match reply {
        Reply::Player(player) => player_line(player),
        Reply::Started(start) => format!(
            "game {} started at {} difficulty\n{}",
            start.game.id, start.game.difficulty, start.rendering
        ),
        Reply::Moved(outcome) => {
            let mut out = format!("you: {}", played_line(&outcome.player_move));
            if let Some(reply) = &outcome.oracle_move {
                let _ = write!(out, "\noracle: {}", played_line(reply));
            }
            let _ = write!(out, "\n{}", outcome.rendering);
            if outcome.status.is_terminal() {
                let _ = write!(out, "\ngame over: {}", outcome.status);
                if let Some(rating) = &outcome.rating {
                    let _ = write!(out, "\n{}", rating_line(rating));
                }
            }
            out
        }
        Reply::Board(board) => format!("after {} moves\n{}\n{}", board.ply, board.rendering, board.fen),
        Reply::History { moves, .. } => moves.iter().map(history_line).collect::<Vec<_>>().join("\n"),
        Reply::Evaluation(view) => {
            let e = &view.evaluation;
            let mut out = format!(
                "score {} at depth {}, white {:.1}% / black {:.1}%",
                e.score, e.depth, e.win_probability_white, e.win_probability_black
            );
            if view.stale {
                out.push_str(" (updating)");
            }
            out
        }
        Reply::Resigned { game_id, rating } => {
            let mut out = format!("resigned game {game_id}");
            if let Some(rating) = rating {
                let _ = write!(out, "\n{}", rating_line(rating));
            }
            out
        }
        Reply::Rating(rating) => rating_line(rating),
        Reply::Recent { games } if games.is_empty() => "no finished games yet".to_string(),
        Reply::Recent { games } => games.iter().map(summary_line).collect::<Vec<_>>().join("\n"),
        Reply::Progress { report: None } => "no finished games yet".to_string(),
        Reply::Progress { report: Some(report) } => progress_line(report),
        Reply::Leaderboard { players } => players
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{:>3}. {}", i + 1, player_line(p)))
            .collect::<Vec<_>>()
            .join("\n"),
        Reply::Help { text } => text.to_string(),
        Reply::Bye => "bye".to_string(),
    }
}

fn player_line(p: &Player) -> String {
    format!(
        "{} rating {} ({} games: {}W {}L {}D)",
        p.username, p.rating, p.total_games, p.wins, p.losses, p.draws
    )
}

fn played_line(m: &PlayedMove) -> String {
    let mut out = m.notation.clone();
    if let Some(capture) = &m.capture {
        let _ = write!(out, " ({} takes {})", capture.moved, capture.captured);
    }
    if let Some(quality) = m.quality {
        let _ = write!(out, " [{quality}]");
    }
    out
}

fn history_line(m: &MoveRecord) -> String {
    let who = match m.mover {
        Mover::Player => "you",
        Mover::Oracle => "oracle",
        Mover::Initial => "start",
    };
    let mut out = format!("{:>3}. {:<6} {who}", m.seq, m.notation);
    if let Some(quality) = m.quality {
        let _ = write!(out, " [{quality}]");
    }
    out
}

fn rating_line(r: &crate::analysis::RatingOutcome) -> String {
    format!(
        "rating {} (+{}) from {} analyzed moves",
        r.rating, r.increment, r.moves_analyzed
    )
}

fn summary_line(s: &GameSummary) -> String {
    format!(
        "{} {}: {} moves, {} brilliant, {} good, {} okay, {} blunders",
        s.game_id, s.status, s.player_moves, s.brilliant, s.good, s.okay, s.blunder
    )
}

fn percent(share: f64) -> String {
    format!("{:.0}%", share * 100.0)
}

fn progress_line(r: &ProgressReport) -> String {
    let trend = match r.trend {
        Trend::Improving => "improving",
        Trend::Steady => "steady",
        Trend::Declining => "declining",
        Trend::FirstGame => "first game",
    };
    match (r.previous_accuracy, r.previous_blunder_rate) {
        (Some(acc), Some(blunders)) => format!(
            "accuracy {} (before {}), blunders {} (before {}): {trend}",
            percent(r.latest_accuracy),
            percent(acc),
            percent(r.latest_blunder_rate),
            percent(blunders)
        ),
        _ => format!(
            "accuracy {}, blunders {}: {trend}",
            percent(r.latest_accuracy),
            percent(r.latest_blunder_rate)
        ),
    }
}
