use std::sync::Arc;
use std::time::Duration;

use engine::{spawn_oracle, MockOracle};

use super::*;
use crate::analysis::{Evaluator, EvaluatorConfig};
use crate::persistence::sqlite::{Database, SqlitePersistence};
use crate::session::SessionConfig;

async fn console(format: OutputFormat) -> (Database, Console<SqlitePersistence>) {
    let db = Database::new_in_memory().await.unwrap();
    let store = Arc::new(SqlitePersistence::from_database(&db));
    let oracle = spawn_oracle(MockOracle::new(), Duration::from_secs(5));
    let evaluator = Evaluator::spawn(store.clone(), oracle.clone(), EvaluatorConfig::default());
    let sessions = SessionManager::new(store.clone(), oracle, evaluator, SessionConfig::default());
    (db, Console::new(store, sessions, format))
}

async fn run_script(console: &mut Console<SqlitePersistence>, script: &str) -> String {
    let mut output = Vec::new();
    console.run(script.as_bytes(), &mut output).await.unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn test_text_session() {
    let (_db, mut console) = console(OutputFormat::Text).await;
    let out = run_script(
        &mut console,
        "start
register alice alice@example.com pw
start
# comment
move e2e4
move e2e5
history
board 1
resign
eval
recent
progress
leaderboard
quit
whoami
",
    )
    .await;

    assert!(out.contains("error: sign in first"), "{out}");
    assert!(out.contains("alice rating 0 (0 games: 0W 0L 0D)"), "{out}");
    assert!(out.contains("started at medium difficulty"), "{out}");
    assert!(out.contains("you: e2e4"), "{out}");
    assert!(out.contains("oracle: a7a5"), "{out}");
    assert!(out.contains("error: Invalid move"), "{out}");
    assert!(out.contains("after 1 moves"), "{out}");
    assert!(out.contains("resigned game"), "{out}");
    assert!(out.contains("score "), "{out}");
    assert!(out.contains("AI_WIN: 1 moves"), "{out}");
    assert!(out.contains("first game"), "{out}");
    assert!(out.contains("(1 games: 0W 1L 0D)"), "{out}");
    assert!(out.trim_end().ends_with("bye"), "{out}");
    assert_eq!(out.matches("alice rating").count(), 2, "{out}");
}

#[tokio::test]
async fn test_json_output() {
    let (_db, mut console) = console(OutputFormat::Json).await;
    let out = run_script(
        &mut console,
        "register alice alice@example.com pw
start hard
move e2e4
login alice wrong
start
fly
",
    )
    .await;

    let lines: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 6, "{out}");

    assert_eq!(lines[0]["kind"], "player");
    assert_eq!(lines[0]["username"], "alice");
    assert!(lines[0].get("password_hash").is_none());

    assert_eq!(lines[1]["kind"], "started");
    assert_eq!(lines[1]["game"]["difficulty"], "hard");
    assert_eq!(lines[1]["game"]["status"], "IN_PROGRESS");

    assert_eq!(lines[2]["kind"], "moved");
    assert_eq!(lines[2]["player_move"]["notation"], "e2e4");
    assert_eq!(lines[2]["oracle_move"]["notation"], "a7a5");

    assert_eq!(lines[3]["error"], "bad_credentials");
    assert_eq!(lines[4]["error"], "conflict");
    assert_eq!(lines[5]["error"], "bad_command");
}

#[tokio::test]
async fn test_login_switches_player() {
    let (_db, mut console) = console(OutputFormat::Text).await;
    console
        .execute(Command::Register {
            username: "alice".into(),
            email: "a@example.com".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    console.execute(Command::Start(Default::default())).await.unwrap();

    console
        .execute(Command::Register {
            username: "bob".into(),
            email: "b@example.com".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    let err = console.execute(Command::History).await.unwrap_err();
    assert!(matches!(err, ConsoleError::NoGame));

    console
        .execute(Command::Login {
            username: "alice".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    let err = console.execute(Command::History).await.unwrap_err();
    assert_eq!(err.kind(), "no_moves");
    let Reply::Board(board) = console.execute(Command::Board(None)).await.unwrap() else {
        panic!("expected a board");
    };
    assert_eq!(board.ply, 0);
}
