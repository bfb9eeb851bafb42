use crate::session::Difficulty;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        username: String,
        email: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    WhoAmI,
    Start(Difficulty),
    Move(String),
    /// Board after `Some(ply)` moves, or the current board.
    Board(Option<usize>),
    History,
    Eval,
    Resign,
    Rating(Option<String>),
    Recent,
    Progress,
    Leaderboard(u32),
    Help,
    Quit,
}

pub const DEFAULT_LEADERBOARD_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Invalid(String),
}

pub const HELP: &str = "\
commands:
  register <username> <email> <password>
  login <username> <password>
  whoami
  start [very-low|low|medium|hard|extreme]
  move <uci>              e.g. move e2e4, move e7e8q
  board [ply]
  history
  eval
  resign
  rating [game-id]
  recent
  progress
  leaderboard [n]
  help
  quit";

impl Command {
    /// Parse a line. Blank lines and `#` comments give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("register", [username, email, password]) => Self::Register {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
            ("register", _) => return Err(ParseError::Usage("register <username> <email> <password>")),
            ("login", [username, password]) => Self::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(ParseError::Usage("login <username> <password>")),
            ("whoami", []) => Self::WhoAmI,
            ("start", []) => Self::Start(Difficulty::default()),
            ("start", [level]) => Self::Start(
                level
                    .parse::<Difficulty>()
                    .map_err(|e| ParseError::Invalid(e.to_string()))?,
            ),
            ("start", _) => return Err(ParseError::Usage("start [difficulty]")),
            ("move" | "m", [mv]) => Self::Move(mv.to_string()),
            ("move" | "m", _) => return Err(ParseError::Usage("move <uci>")),
            ("board", []) => Self::Board(None),
            ("board", [ply]) => Self::Board(Some(ply.parse().map_err(|_| {
                ParseError::Invalid(format!("not a move count: {ply:?}"))
            })?)),
            ("history", []) => Self::History,
            ("eval", []) => Self::Eval,
            ("resign", []) => Self::Resign,
            ("rating", []) => Self::Rating(None),
            ("rating", [game_id]) => Self::Rating(Some(game_id.to_string())),
            ("recent", []) => Self::Recent,
            ("progress", []) => Self::Progress,
            ("leaderboard", []) => Self::Leaderboard(DEFAULT_LEADERBOARD_SIZE),
            ("leaderboard", [n]) => Self::Leaderboard(n.parse().map_err(|_| {
                ParseError::Invalid(format!("not a count: {n:?}"))
            })?),
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            (
                "whoami" | "board" | "history" | "eval" | "resign" | "rating" | "recent"
                | "progress" | "leaderboard",
                _,
            ) => return Err(ParseError::Usage("too many arguments (try `help`)")),
            (other, _) => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        Command::parse(line).unwrap().unwrap()
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(Command::parse("   "), Ok(None));
        assert_eq!(Command::parse("# setup"), Ok(None));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse("register alice a@example.com pw"),
            Command::Register {
                username: "alice".into(),
                email: "a@example.com".into(),
                password: "pw".into(),
            }
        );
        assert_eq!(parse("START"), Command::Start(Difficulty::Medium));
        assert_eq!(parse("start very_low"), Command::Start(Difficulty::VeryLow));
        assert_eq!(parse("  move e2e4 "), Command::Move("e2e4".into()));
        assert_eq!(parse("m e7e8q"), Command::Move("e7e8q".into()));
        assert_eq!(parse("board 3"), Command::Board(Some(3)));
        assert_eq!(parse("rating g-1"), Command::Rating(Some("g-1".into())));
        assert_eq!(parse("leaderboard"), Command::Leaderboard(10));
        assert_eq!(parse("exit"), Command::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Command::parse("login alice"), Err(ParseError::Usage(_))));
        assert!(matches!(Command::parse("start grandmaster"), Err(ParseError::Invalid(_))));
        assert!(matches!(Command::parse("board -1"), Err(ParseError::Invalid(_))));
        assert!(matches!(Command::parse("eval now"), Err(ParseError::Usage(_))));
        assert_eq!(
            Command::parse("castle"),
            Err(ParseError::Unknown("castle".into()))
        );
    }
}
