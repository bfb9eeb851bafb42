//! Line-oriented console driving the session manager.
//!
//! One command per line on the input; each reply is written as text or as a
//! single JSON object per line.

pub mod command;
pub mod render;

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::analysis::RatingOutcome;
use crate::persistence::{
    GameSummary, MoveRecord, Persistence, PersistenceError, Player, PlayerFilter,
};
use crate::players::{PlayerError, Players};
use crate::progress::{self, ProgressReport};
use crate::session::{
    BoardView, EvaluationView, MoveOutcome, SessionError, SessionManager, SessionStart,
};
pub use command::{Command, ParseError};
pub use render::OutputFormat;

const PROMPT: &str = "> ";

/// Reply to one command.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Player(Player),
    Started(SessionStart),
    Moved(MoveOutcome),
    Board(BoardView),
    History {
        game_id: String,
        moves: Vec<MoveRecord>,
    },
    Evaluation(EvaluationView),
    Resigned {
        game_id: String,
        rating: Option<RatingOutcome>,
    },
    Rating(RatingOutcome),
    Recent {
        games: Vec<GameSummary>,
    },
    Progress {
        report: Option<ProgressReport>,
    },
    Leaderboard {
        players: Vec<Player>,
    },
    Help {
        text: &'static str,
    },
    Bye,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("sign in first (login <username> <password>)")]
    NotSignedIn,
    #[error("no game yet (start one with `start`)")]
    NoGame,
}

impl ConsoleError {
    /// Stable code used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "bad_command",
            Self::Session(e) => e.kind(),
            Self::Player(PlayerError::Conflict(_)) => "conflict",
            Self::Player(PlayerError::BadCredentials) => "bad_credentials",
            Self::Player(PlayerError::Invalid(_)) => "invalid",
            Self::Player(_) | Self::Persistence(_) => "persistence",
            Self::NotSignedIn => "not_signed_in",
            Self::NoGame => "no_game",
        }
    }
}

pub struct Console<D: Persistence> {
    store: Arc<D>,
    sessions: SessionManager<D>,
    players: Players<D>,
    format: OutputFormat,
    player: Option<Player>,
    /// Most recent game touched in this console, kept after it ends.
    last_game: Option<String>,
}

impl<D: Persistence> Console<D> {
    pub fn new(store: Arc<D>, sessions: SessionManager<D>, format: OutputFormat) -> Self {
        Self {
            players: Players::new(store.clone()),
            store,
            sessions,
            format,
            player: None,
            last_game: None,
        }
    }

    /// Read commands until `quit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        self.prompt(&mut output).await?;
        while let Some(line) = lines.next_line().await? {
            let result = match Command::parse(&line) {
                Ok(None) => {
                    self.prompt(&mut output).await?;
                    continue;
                }
                Ok(Some(command)) => self.execute(command).await,
                Err(e) => Err(e.into()),
            };
            let rendered = match &result {
                Ok(reply) => render::reply(self.format, reply),
                Err(err) => {
                    tracing::debug!(kind = err.kind(), error = %err, "Command failed");
                    render::error(self.format, err)
                }
            };
            output.write_all(rendered.as_bytes()).await?;
            output.write_all(b"\n").await?;
            if matches!(result, Ok(Reply::Bye)) {
                break;
            }
            self.prompt(&mut output).await?;
        }
        output.flush().await
    }

    async fn prompt<W: AsyncWrite + Unpin>(&self, output: &mut W) -> std::io::Result<()> {
        if self.format == OutputFormat::Text {
            output.write_all(PROMPT.as_bytes()).await?;
        }
        output.flush().await
    }

    #[tracing::instrument(skip_all, fields(player = self.player.as_ref().map(|p| p.username.as_str())))]
    pub async fn execute(&mut self, command: Command) -> Result<Reply, ConsoleError> {
        match command {
            Command::Register {
                username,
                email,
                password,
            } => {
                let player = self.players.register(&username, &email, &password).await?;
                self.sign_in(player.clone());
                Ok(Reply::Player(player))
            }
            Command::Login { username, password } => {
                let player = self.players.authenticate(&username, &password).await?;
                self.sign_in(player.clone());
                Ok(Reply::Player(player))
            }
            Command::WhoAmI => {
                let id = self.player_id()?;
                let player = self
                    .players
                    .find(&PlayerFilter::by_id(id))
                    .await?
                    .ok_or(ConsoleError::NotSignedIn)?;
                self.player = Some(player.clone());
                Ok(Reply::Player(player))
            }
            Command::Start(difficulty) => {
                let player_id = self.player_id()?.to_string();
                let start = self.sessions.start_session(&player_id, difficulty).await?;
                self.last_game = Some(start.game.id.clone());
                Ok(Reply::Started(start))
            }
            Command::Move(notation) => {
                let player_id = self.player_id()?.to_string();
                let game = self.sessions.active_session(&player_id).await?;
                self.last_game = Some(game.id.clone());
                let outcome = self.sessions.apply_player_move(&game.id, &notation).await?;
                Ok(Reply::Moved(outcome))
            }
            Command::Board(ply) => {
                let game_id = self.current_game().await?;
                let board = match ply {
                    Some(ply) => self.sessions.board_at(&game_id, ply).await?,
                    None => {
                        let view = self.sessions.load_session(&game_id).await?;
                        BoardView {
                            game_id,
                            ply: view.moves.iter().filter(|m| !m.is_initial()).count(),
                            fen: view.fen,
                            rendering: view.rendering,
                        }
                    }
                };
                Ok(Reply::Board(board))
            }
            Command::History => {
                let game_id = self.current_game().await?;
                let moves = self.sessions.move_history(&game_id).await?;
                Ok(Reply::History { game_id, moves })
            }
            Command::Eval => {
                let game_id = self.current_game().await?;
                Ok(Reply::Evaluation(
                    self.sessions.current_evaluation(&game_id).await?,
                ))
            }
            Command::Resign => {
                let player_id = self.player_id()?.to_string();
                let game = self.sessions.active_session(&player_id).await?;
                let rating = self.sessions.resign(&game.id).await?;
                self.last_game = Some(game.id.clone());
                Ok(Reply::Resigned {
                    game_id: game.id,
                    rating,
                })
            }
            Command::Rating(game_id) => {
                let player_id = self.player_id()?.to_string();
                let outcome = self
                    .sessions
                    .refresh_rating(&player_id, game_id.as_deref())
                    .await?;
                Ok(Reply::Rating(outcome))
            }
            Command::Recent => {
                let player_id = self.player_id()?;
                let games = progress::recent_games(self.store.as_ref(), player_id).await?;
                Ok(Reply::Recent { games })
            }
            Command::Progress => {
                let player_id = self.player_id()?;
                let report = progress::progress_report(self.store.as_ref(), player_id).await?;
                Ok(Reply::Progress { report })
            }
            Command::Leaderboard(limit) => Ok(Reply::Leaderboard {
                players: self.players.leaderboard(limit).await?,
            }),
            Command::Help => Ok(Reply::Help {
                text: command::HELP,
            }),
            Command::Quit => Ok(Reply::Bye),
        }
    }

    fn sign_in(&mut self, player: Player) {
        tracing::info!(player_id = %player.id, "Signed in");
        self.player = Some(player);
        self.last_game = None;
    }

    fn player_id(&self) -> Result<&str, ConsoleError> {
        self.player
            .as_ref()
            .map(|p| p.id.as_str())
            .ok_or(ConsoleError::NotSignedIn)
    }

    /// The signed-in player's game in progress, else the last game touched.
    async fn current_game(&self) -> Result<String, ConsoleError> {
        let player_id = self.player_id()?;
        match self.sessions.active_session(player_id).await {
            Ok(game) => Ok(game.id),
            Err(SessionError::NoActiveSession(_)) => {
                self.last_game.clone().ok_or(ConsoleError::NoGame)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests;
