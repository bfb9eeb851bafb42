use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chess::{Capture, PieceColor, PieceKind, STARTING_FEN};
use engine::{spawn_oracle, MockOracle};

use super::*;
use crate::analysis::{EvaluatorConfig, EvaluatorEvent};
use crate::persistence::sqlite::test_support::insert_player;
use crate::persistence::sqlite::{Database, SqlitePersistence};
use crate::persistence::SummaryRepository;

struct Harness {
    _db: Database,
    manager: SessionManager<SqlitePersistence>,
}

async fn harness_with(mock: MockOracle, timeout: Duration, book: &str) -> Harness {
    let db = Database::new_in_memory().await.unwrap();
    insert_player(&db, "p1", "alice").await;
    let store = Arc::new(SqlitePersistence::from_database(&db));
    let oracle = spawn_oracle(mock, timeout);
    let evaluator = Evaluator::spawn(store.clone(), oracle.clone(), EvaluatorConfig::default());
    let config = SessionConfig {
        analysis_depth: 8,
        opening_book: book.parse().unwrap(),
    };
    Harness {
        _db: db,
        manager: SessionManager::new(store, oracle, evaluator, config),
    }
}

async fn harness() -> Harness {
    harness_with(MockOracle::new(), Duration::from_secs(5), "").await
}

async fn ledger_len(h: &Harness, game_id: &str) -> usize {
    h.manager.load_session(game_id).await.unwrap().moves.len()
}

#[tokio::test]
async fn test_start_session_writes_initial_state() {
    let h = harness().await;
    let start = h.manager.start_session("p1", Difficulty::Medium).await.unwrap();
    assert_eq!(start.fen, STARTING_FEN);
    assert!(start.rendering.contains("r n b q k b n r"));
    assert_eq!(start.game.status, GameStatus::InProgress);

    let view = h.manager.load_session(&start.game.id).await.unwrap();
    assert_eq!(view.moves.len(), 1);
    assert!(view.moves[0].is_initial());
    assert_eq!(view.fen, STARTING_FEN);

    let eval = h.manager.current_evaluation(&start.game.id).await.unwrap();
    assert_eq!(eval.evaluation.win_probability_white, 50.0);
    assert_eq!(eval.evaluation.depth, 0);
    assert!(!eval.stale);

    let active = h.manager.active_session("p1").await.unwrap();
    assert_eq!(active.id, start.game.id);
}

#[tokio::test]
async fn test_second_start_conflicts_without_new_row() {
    let h = harness().await;
    h.manager.start_session("p1", Difficulty::Low).await.unwrap();
    let err = h
        .manager
        .start_session("p1", Difficulty::Hard)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");
    assert_eq!(h.manager.store().games().count_games("p1", None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unknown_player_and_game() {
    let h = harness().await;
    let err = h
        .manager
        .start_session("ghost", Difficulty::Medium)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(
        h.manager.apply_player_move("nope", "e2e4").await.unwrap_err().kind(),
        "not_found"
    );
    assert_eq!(h.manager.board_at("nope", 0).await.unwrap_err().kind(), "not_found");
    assert_eq!(
        h.manager.active_session("p1").await.unwrap_err().kind(),
        "no_active_session"
    );
}

#[tokio::test]
async fn test_opening_move_and_evaluation() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;
    let mut events = h.manager.evaluator().subscribe();

    let outcome = h.manager.apply_player_move(&game_id, "e2e4").await.unwrap();
    assert_eq!(outcome.status, GameStatus::InProgress);
    assert_eq!(outcome.player_move.notation, "e2e4");
    assert!(outcome.player_move.quality.is_some());
    let reply = outcome.oracle_move.unwrap();
    assert_eq!(reply.notation, "a7a5");
    assert_eq!(reply.quality, None);
    assert_eq!(outcome.fen, reply.fen_after);
    assert_eq!(ledger_len(&h, &game_id).await, 3);

    let evaluation = loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .unwrap()
            .unwrap();
        if let EvaluatorEvent::Updated(e) = event {
            if e.game_id == game_id && e.ply_count == 2 {
                break e;
            }
        }
    };
    let total = evaluation.win_probability_white + evaluation.win_probability_black;
    assert!((total - 100.0).abs() < 1e-9);
    assert!((8..=12).contains(&evaluation.depth));

    let view = h.manager.current_evaluation(&game_id).await.unwrap();
    assert_eq!(view.evaluation, evaluation);
    assert!(!view.stale);
}

#[tokio::test]
async fn test_illegal_move_appends_nothing() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    for bad in ["e2e5", "e7e5", "hello", ""] {
        let err = h.manager.apply_player_move(&game_id, bad).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_move", "{bad}");
    }
    assert_eq!(ledger_len(&h, &game_id).await, 1);
    assert_eq!(
        h.manager.move_history(&game_id).await.unwrap_err().kind(),
        "no_moves"
    );
}

#[tokio::test]
async fn test_ledger_grows_two_records_per_exchange() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    for (i, mv) in ["e2e4", "d2d4", "g1f3"].into_iter().enumerate() {
        h.manager.apply_player_move(&game_id, mv).await.unwrap();
        assert_eq!(ledger_len(&h, &game_id).await, 1 + 2 * (i + 1));
    }

    let history = h.manager.move_history(&game_id).await.unwrap();
    let movers: Vec<Mover> = history.iter().map(|m| m.mover).collect();
    assert_eq!(
        movers,
        vec![
            Mover::Player,
            Mover::Oracle,
            Mover::Player,
            Mover::Oracle,
            Mover::Player,
            Mover::Oracle
        ]
    );
    assert!(history
        .iter()
        .all(|m| m.quality.is_some() == (m.mover == Mover::Player)));
}

#[tokio::test]
async fn test_replay_reproduces_every_snapshot() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;
    for mv in ["e2e4", "g1f3", "f1c4"] {
        h.manager.apply_player_move(&game_id, mv).await.unwrap();
    }

    let view = h.manager.load_session(&game_id).await.unwrap();
    for record in &view.moves {
        let board = h
            .manager
            .board_at(&game_id, record.seq as usize)
            .await
            .unwrap();
        assert_eq!(board.fen, record.fen_after, "ply {}", record.seq);
    }

    let clamped = h.manager.board_at(&game_id, 100).await.unwrap();
    assert_eq!(clamped.ply, 6);
    assert_eq!(clamped.fen, view.fen);
}

#[tokio::test]
async fn test_player_checkmate_ends_without_reply() {
    // Scholar's mate, with Black's replies forced by the book.
    let h = harness_with(
        MockOracle::new(),
        Duration::from_secs(5),
        "1:e7e5,3:b8c6,5:g8f6",
    )
    .await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    for mv in ["e2e4", "f1c4", "d1h5"] {
        let outcome = h.manager.apply_player_move(&game_id, mv).await.unwrap();
        assert_eq!(outcome.status, GameStatus::InProgress);
    }
    let outcome = h.manager.apply_player_move(&game_id, "h5f7").await.unwrap();
    assert_eq!(outcome.status, GameStatus::PlayerWin);
    assert!(outcome.oracle_move.is_none());
    assert_eq!(
        outcome.player_move.capture,
        Some(Capture {
            moved: PieceKind::Queen,
            captured: PieceKind::Pawn,
            captured_color: PieceColor::Black,
            en_passant: false,
        })
    );
    assert!(outcome.rating.is_some());

    // Four player moves, three replies, plus the initial record.
    assert_eq!(ledger_len(&h, &game_id).await, 8);

    let game = h.manager.load_session(&game_id).await.unwrap().game;
    assert_eq!(game.status, GameStatus::PlayerWin);
    assert!(game.ended_at.is_some());

    let err = h.manager.apply_player_move(&game_id, "a2a3").await.unwrap_err();
    assert_eq!(err.kind(), "no_active_session");

    let store = h.manager.store();
    let player = store
        .players()
        .find_player(&PlayerFilter::by_id("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((player.wins, player.total_games), (1, 1));
    let recent = store.summaries().recent_summaries("p1").await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].player_moves, 4);
}

#[tokio::test]
async fn test_oracle_checkmate_and_rating() {
    // Fool's mate: the mock always takes a mate in one.
    let h = harness_with(MockOracle::new(), Duration::from_secs(5), "1:e7e5").await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    h.manager.apply_player_move(&game_id, "f2f3").await.unwrap();
    let outcome = h.manager.apply_player_move(&game_id, "g2g4").await.unwrap();
    assert_eq!(outcome.status, GameStatus::AiWin);
    assert_eq!(outcome.oracle_move.unwrap().notation, "d8h4");
    assert_eq!(ledger_len(&h, &game_id).await, 5);

    // Two quiet non-best moves: +5 each, so a gain of 10 earns 20.
    let rating = outcome.rating.unwrap();
    assert_eq!(rating.moves_analyzed, 2);
    assert_eq!(rating.rating_delta, 10);
    assert_eq!(rating.increment, 20);
    assert_eq!(rating.rating, 20);

    assert_eq!(
        h.manager.active_session("p1").await.unwrap_err().kind(),
        "no_active_session"
    );
    // A fresh game may start now.
    h.manager.start_session("p1", Difficulty::Hard).await.unwrap();
}

#[tokio::test]
async fn test_resign() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;
    h.manager.apply_player_move(&game_id, "e2e4").await.unwrap();

    h.manager.resign(&game_id).await.unwrap();
    let game = h.manager.load_session(&game_id).await.unwrap().game;
    assert_eq!(game.status, GameStatus::AiWin);
    assert_eq!(
        h.manager.resign(&game_id).await.unwrap_err().kind(),
        "no_active_session"
    );

    let player = h
        .manager
        .store()
        .players()
        .find_player(&PlayerFilter::by_id("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(player.losses, 1);
}

#[tokio::test]
async fn test_oracle_outage_leaves_ledger_untouched() {
    let mock = MockOracle::new();
    let outage = mock.outage_switch();
    let h = harness_with(mock, Duration::from_secs(5), "").await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    outage.store(true, Ordering::SeqCst);
    let err = h.manager.apply_player_move(&game_id, "e2e4").await.unwrap_err();
    assert_eq!(err.kind(), "oracle_unavailable");
    assert_eq!(ledger_len(&h, &game_id).await, 1);

    outage.store(false, Ordering::SeqCst);
    h.manager.apply_player_move(&game_id, "e2e4").await.unwrap();
    assert_eq!(ledger_len(&h, &game_id).await, 3);
}

#[tokio::test]
async fn test_slow_oracle_times_out() {
    let mock = MockOracle::new().with_delay(Duration::from_millis(200));
    let h = harness_with(mock, Duration::from_millis(20), "").await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    let err = h.manager.apply_player_move(&game_id, "e2e4").await.unwrap_err();
    assert!(matches!(err, SessionError::OracleTimeout(_)));
    assert_eq!(ledger_len(&h, &game_id).await, 1);
}

#[tokio::test]
async fn test_missing_reply_is_completed_first() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    // A player move whose reply was lost.
    let after_e4 = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
    h.manager
        .store()
        .moves()
        .append_move(&MoveRecord {
            game_id: game_id.clone(),
            seq: 1,
            mover: Mover::Player,
            notation: "e2e4".into(),
            fen_after: after_e4.into(),
            quality: None,
            capture: None,
            created_at: 1,
        })
        .await
        .unwrap();

    h.manager.apply_player_move(&game_id, "d2d4").await.unwrap();
    let history = h.manager.move_history(&game_id).await.unwrap();
    let notations: Vec<&str> = history.iter().map(|m| m.notation.as_str()).collect();
    assert_eq!(notations, vec!["e2e4", "a7a5", "d2d4", "a5a4"]);
}

#[tokio::test]
async fn test_moves_on_one_session_are_serialized() {
    let h = harness().await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    let (first, second) = tokio::join!(
        h.manager.apply_player_move(&game_id, "e2e4"),
        h.manager.apply_player_move(&game_id, "e2e4"),
    );
    let errors: Vec<&str> = [&first, &second]
        .into_iter()
        .filter_map(|r| r.as_ref().err().map(SessionError::kind))
        .collect();
    assert_eq!(errors, vec!["invalid_move"]);
    assert_eq!(ledger_len(&h, &game_id).await, 3);
}

#[tokio::test]
async fn test_castling_only_as_king_move() {
    let h = harness_with(
        MockOracle::new(),
        Duration::from_secs(5),
        "1:e7e5,3:b8c6,5:g8f6",
    )
    .await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;
    for mv in ["e2e4", "g1f3", "f1c4"] {
        h.manager.apply_player_move(&game_id, mv).await.unwrap();
    }

    let err = h.manager.apply_player_move(&game_id, "e1h1").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_move");
    assert_eq!(ledger_len(&h, &game_id).await, 7);

    let outcome = h.manager.apply_player_move(&game_id, "E1G1").await.unwrap();
    assert_eq!(outcome.player_move.notation, "e1g1");
    let history = h.manager.move_history(&game_id).await.unwrap();
    assert_eq!(history[6].notation, "e1g1");
    assert_eq!(history[6].mover, Mover::Player);
}

#[tokio::test]
async fn test_rejected_calls_leave_no_lock_entries() {
    let h = harness().await;
    for _ in 0..20 {
        let id = generate_id();
        assert_eq!(
            h.manager.apply_player_move(&id, "e2e4").await.unwrap_err().kind(),
            "not_found"
        );
        assert_eq!(h.manager.resign(&id).await.unwrap_err().kind(), "not_found");
    }
    assert_eq!(h.manager.locks.lock().await.len(), 0);

    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;
    h.manager.apply_player_move(&game_id, "e2e4").await.unwrap();
    assert_eq!(h.manager.locks.lock().await.len(), 1);
    h.manager.resign(&game_id).await.unwrap();
    assert_eq!(h.manager.locks.lock().await.len(), 0);

    for _ in 0..5 {
        assert_eq!(
            h.manager.apply_player_move(&game_id, "d2d4").await.unwrap_err().kind(),
            "no_active_session"
        );
        assert_eq!(
            h.manager.resign(&game_id).await.unwrap_err().kind(),
            "no_active_session"
        );
    }
    assert_eq!(h.manager.locks.lock().await.len(), 0);
}

#[tokio::test]
async fn test_stalemate_ends_in_draw() {
    // The ten-move stalemate 1.e3 a5 2.Qh5 Ra6 ... 10.Qe6, Black's moves
    // forced by the book.
    let h = harness_with(
        MockOracle::new(),
        Duration::from_secs(5),
        "1:a7a5,3:a8a6,5:h7h5,7:a6h6,9:f7f6,11:e8f7,13:d8d3,15:d3h7,17:f7g6",
    )
    .await;
    let game_id = h
        .manager
        .start_session("p1", Difficulty::Medium)
        .await
        .unwrap()
        .game
        .id;

    let moves = [
        "e2e3", "d1h5", "h5a5", "h2h4", "a5c7", "c7d7", "d7b7", "b7b8", "b8c8",
    ];
    for mv in moves {
        let outcome = h.manager.apply_player_move(&game_id, mv).await.unwrap();
        assert_eq!(outcome.status, GameStatus::InProgress, "after {mv}");
    }
    let outcome = h.manager.apply_player_move(&game_id, "c8e6").await.unwrap();
    assert_eq!(outcome.status, GameStatus::Draw);
    assert!(outcome.oracle_move.is_none());
    // Ten player moves, nine replies, plus the initial record.
    assert_eq!(ledger_len(&h, &game_id).await, 20);

    let game = h.manager.load_session(&game_id).await.unwrap().game;
    assert_eq!(game.status, GameStatus::Draw);

    let store = h.manager.store();
    let player = store
        .players()
        .find_player(&PlayerFilter::by_id("p1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        (player.wins, player.losses, player.draws, player.total_games),
        (0, 0, 1, 1)
    );
    let recent = store.summaries().recent_summaries("p1").await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].status, GameStatus::Draw);
    assert_eq!(recent[0].player_moves, 10);
}
