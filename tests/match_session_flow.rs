//! Match lifecycle against the in-memory store:
//! - turn alternation and rejected moves
//! - the draw sub-protocol and how offers survive moves
//! - reaping of finished matches

use std::sync::Arc;

use chess_session::notation::Notation;
use chess_session::rules::{EncodedBoard, MoveDescriptor, RulesEngine, START_BOARD};
use chess_session::session::{current_opponents, find_existing};
use chess_session::{
    DrawOutcome, GameError, GameStore, GroupId, KeyedLocks, MatchKey, MatchSession, MemoryStore,
    MoveOptions, PlayerId, PlayerNames, Side, Status, SyncMode,
};

const GROUP: GroupId = GroupId(100);
const ALICE: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);

fn key() -> MatchKey {
    MatchKey::new(GROUP, ALICE, BOB).unwrap()
}

async fn auto_session(store: &Arc<MemoryStore>) -> MatchSession {
    MatchSession::open(
        store.clone(),
        key(),
        PlayerNames::new("alice", "bob"),
        SyncMode::Auto,
    )
    .await
    .unwrap()
}

async fn stored_draw(store: &MemoryStore) -> Option<Side> {
    store.get_match(&key()).await.unwrap().unwrap().draw
}

// =============================================================================
// Turns
// =============================================================================

#[tokio::test]
async fn opening_creates_starting_record() {
    let store = Arc::new(MemoryStore::new());
    let session = auto_session(&store).await;

    assert_eq!(session.turn(), Side::White);
    let stored = store.get_match(&key()).await.unwrap().unwrap();
    assert_eq!(stored.board, START_BOARD);
    assert_eq!(stored.turn, Side::White);
    assert_eq!(stored.moved, "000000");
    assert_eq!(stored.names, PlayerNames::new("alice", "bob"));
}

#[tokio::test]
async fn turn_alternates_with_each_applied_move() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    let moves = ["e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6"];
    for (i, mv) in moves.iter().enumerate() {
        let result = session.apply_move(mv).await.unwrap();
        assert_eq!(result.status, Status::Ongoing);
        let expected = if i % 2 == 0 { Side::Black } else { Side::White };
        assert_eq!(session.turn(), expected);
        assert_eq!(store.get_match(&key()).await.unwrap().unwrap().turn, expected);
    }
    assert!(session.is_players_turn(ALICE));
}

#[tokio::test]
async fn opening_move_is_persisted() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    let result = session.apply_move("e2e4").await.unwrap();
    assert_eq!(result.descriptor.san, "e4");
    assert_eq!(result.status, Status::Ongoing);
    assert!(!result.reaped);

    let stored = store.get_match(&key()).await.unwrap().unwrap();
    assert_eq!(stored.turn, Side::Black);
    assert_eq!(stored.pawn_move.as_deref(), Some("e3"));
    assert!(stored.board.contains("-- -- -- -- P0 -- -- --"));
}

#[tokio::test]
async fn illegal_move_leaves_everything_unchanged() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;
    session.apply_move("d2d4").await.unwrap();
    session.offer_draw(BOB).await.unwrap();

    let before = store.get_match(&key()).await.unwrap().unwrap();
    let board_before = session.encoded_board();

    for bad in ["d7d3", "e1e2", "a8a1"] {
        let err = session.apply_move(bad).await.unwrap_err();
        assert!(matches!(err, GameError::IllegalMove(_)), "{bad}: {err}");
    }

    assert_eq!(session.turn(), Side::Black);
    assert_eq!(session.draw_offer(), Some(Side::Black));
    assert_eq!(session.encoded_board(), board_before);
    assert_eq!(store.get_match(&key()).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn batch_stops_at_first_failure_and_keeps_applied_moves() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    let err = session
        .apply_moves(["e2e4", "e7e5", "e4e5", "g1f3"])
        .await
        .unwrap_err();
    assert!(matches!(err, GameError::IllegalMove(_)));

    assert_eq!(session.turn(), Side::White);
    assert_eq!(session.last_move().map(|m| m.san.as_str()), Some("e5"));
    let stored = store.get_match(&key()).await.unwrap().unwrap();
    assert_eq!(stored.turn, Side::White);
    assert_eq!(stored.pawn_move.as_deref(), Some("e6"));
}

#[tokio::test]
async fn reopening_resumes_stored_position() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;
    session.apply_moves(["e2e4", "c7c5", "g1f3"]).await.unwrap();
    let board = session.encoded_board();
    drop(session);

    let mut resumed = auto_session(&store).await;
    assert_eq!(resumed.turn(), Side::Black);
    assert_eq!(resumed.encoded_board(), board);
    resumed.apply_move("d7d6").await.unwrap();
    assert_eq!(resumed.turn(), Side::White);
}

// =============================================================================
// Draws
// =============================================================================

#[tokio::test]
async fn offering_twice_fails() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    assert_eq!(session.offer_draw(ALICE).await.unwrap(), DrawOutcome::Offered);
    let err = session.offer_draw(ALICE).await.unwrap_err();
    assert!(matches!(err, GameError::DrawAlreadyOffered));
    assert_eq!(stored_draw(&store).await, Some(Side::White));
}

#[tokio::test]
async fn mutual_offer_draws_and_reaps() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    session.apply_move("e2e4").await.unwrap();
    session.apply_move("e7e5").await.unwrap();
    session.offer_draw(ALICE).await.unwrap();
    assert_eq!(stored_draw(&store).await, Some(Side::White));

    // Not Bob's turn, but a counter-offer is an acceptance
    assert_eq!(session.offer_draw(BOB).await.unwrap(), DrawOutcome::Accepted);
    assert_eq!(session.status(), Status::Drawn);
    assert_eq!(session.draw_offer(), None);
    assert!(find_existing(&*store, GROUP, ALICE, BOB)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn accept_requires_opponents_offer() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    let err = session.accept_draw(BOB).await.unwrap_err();
    assert!(matches!(err, GameError::DrawNotOffered));

    session.offer_draw(ALICE).await.unwrap();
    let err = session.accept_draw(ALICE).await.unwrap_err();
    assert!(matches!(err, GameError::DrawNotOffered));

    assert!(session.accept_draw(BOB).await.unwrap());
    assert_eq!(store.match_count(), 0);
}

#[tokio::test]
async fn decline_clears_offer_only() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;
    session.apply_move("e2e4").await.unwrap();
    session.offer_draw(BOB).await.unwrap();
    let board = session.encoded_board();

    let err = session.decline_draw(BOB).await.unwrap_err();
    assert!(matches!(err, GameError::DrawNotOffered));

    session.decline_draw(ALICE).await.unwrap();
    assert_eq!(session.draw_offer(), None);
    assert_eq!(session.turn(), Side::Black);
    assert_eq!(session.status(), Status::Ongoing);
    assert_eq!(session.encoded_board(), board);
    assert_eq!(stored_draw(&store).await, None);
}

#[tokio::test]
async fn offer_survives_offerors_move_and_expires_after_opponents() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    session.offer_draw(ALICE).await.unwrap();
    session.apply_move("e2e4").await.unwrap();
    // Black to move, offer from white still stands
    assert_eq!(session.draw_offer(), Some(Side::White));
    assert_eq!(stored_draw(&store).await, Some(Side::White));

    session.apply_move("e7e5").await.unwrap();
    // White back on move without an answer: offer lapses
    assert_eq!(session.draw_offer(), None);
    assert_eq!(stored_draw(&store).await, None);

    assert_eq!(session.offer_draw(ALICE).await.unwrap(), DrawOutcome::Offered);
}

#[tokio::test]
async fn draw_offer_on_opponents_turn_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;
    session.apply_move("e2e4").await.unwrap();

    let err = session.offer_draw(ALICE).await.unwrap_err();
    assert!(matches!(err, GameError::WrongTurn));
    assert_eq!(stored_draw(&store).await, None);
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn checkmate_reaps_in_auto_mode() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;

    let results = session
        .apply_moves(["f2f3", "e7e5", "g2g4", "d8h4"])
        .await
        .unwrap();
    let last = results.last().unwrap();
    assert_eq!(
        last.status,
        Status::Decisive {
            winner: Side::Black
        }
    );
    assert!(last.finished);
    assert!(last.reaped);
    assert_eq!(store.match_count(), 0);

    // Reaping again is harmless
    assert!(session.check_and_reap().await.unwrap());

    let err = session.apply_move("e1f2").await.unwrap_err();
    assert!(matches!(err, GameError::GameOver(_)));
}

#[tokio::test]
async fn manual_mode_keeps_record_until_sync() {
    let store = Arc::new(MemoryStore::new());
    let mut session = MatchSession::open(
        store.clone(),
        key(),
        PlayerNames::default(),
        SyncMode::Manual,
    )
    .await
    .unwrap();

    session.offer_draw(ALICE).await.unwrap();
    assert_eq!(stored_draw(&store).await, None);
    assert!(!session.accept_draw(BOB).await.unwrap());
    assert_eq!(store.match_count(), 1);

    assert!(session.sync_now().await.unwrap());
    assert_eq!(store.match_count(), 0);
}

#[tokio::test]
async fn manual_checkmate_is_finished_but_not_reaped() {
    let store = Arc::new(MemoryStore::new());
    let mut session = MatchSession::open(
        store.clone(),
        key(),
        PlayerNames::default(),
        SyncMode::Manual,
    )
    .await
    .unwrap();

    let results = session
        .apply_moves(["f2f3", "e7e5", "g2g4", "d8h4"])
        .await
        .unwrap();
    let last = results.last().unwrap();
    assert!(last.finished);
    assert!(!last.reaped);
    assert!(store.get_match(&key()).await.unwrap().is_some());

    assert!(session.sync_now().await.unwrap());
    assert!(store.get_match(&key()).await.unwrap().is_none());
}

#[tokio::test]
async fn opponents_track_running_games() {
    let store = Arc::new(MemoryStore::new());
    let carol = PlayerId(3);
    let mut first = auto_session(&store).await;
    MatchSession::open(
        store.clone(),
        MatchKey::new(GROUP, carol, ALICE).unwrap(),
        PlayerNames::default(),
        SyncMode::Auto,
    )
    .await
    .unwrap();

    let opponents = current_opponents(&*store, GROUP, ALICE).await.unwrap();
    assert_eq!(opponents, vec![BOB, carol]);

    first.offer_draw(ALICE).await.unwrap();
    first.offer_draw(BOB).await.unwrap();
    let opponents = current_opponents(&*store, GROUP, ALICE).await.unwrap();
    assert_eq!(opponents, vec![carol]);
}

#[tokio::test]
async fn save_to_writes_rendering() {
    let store = Arc::new(MemoryStore::new());
    let mut session = auto_session(&store).await;
    let path = std::env::temp_dir().join(format!("match-flow-{}.txt", std::process::id()));

    let result = session
        .apply_move_with(
            "g1f3",
            MoveOptions {
                render: false,
                save_to: Some(path.clone()),
            },
        )
        .await
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(Some(written.as_str()), result.artifact.as_ref().and_then(|a| a.as_text()));
    assert!(written.contains("   bob\n"));
    assert!(written.ends_with("last move: Nf3 (g1f3)\n"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn keyed_locks_serialize_competing_offers() {
    let store = Arc::new(MemoryStore::new());
    auto_session(&store).await;
    let locks = Arc::new(KeyedLocks::<MatchKey>::new());

    let offer = |player: PlayerId| {
        let store = store.clone();
        let locks = locks.clone();
        tokio::spawn(async move {
            let _guard = locks.lock(&key()).await;
            let mut session = auto_session(&store).await;
            session.offer_draw(player).await
        })
    };

    let (a, b) = tokio::join!(offer(ALICE), offer(BOB));
    let outcomes = [a.unwrap(), b.unwrap()];

    // Bob may not offer on White's turn, so only Alice's offer is recorded
    // unless Bob came second and accepted it.
    let accepted = outcomes
        .iter()
        .any(|o| matches!(o, Ok(DrawOutcome::Accepted)));
    if accepted {
        assert_eq!(store.match_count(), 0);
    } else {
        assert_eq!(stored_draw(&store).await, Some(Side::White));
    }
}

// =============================================================================
// Custom rules engine
// =============================================================================

/// Every well-formed move is legal except `h8h8`; `a1a1` wins on the spot.
#[derive(Clone, Copy, Default)]
struct SuddenDeath;

#[derive(Clone, Default)]
struct Tally {
    plies: u32,
    winner: Option<Side>,
}

impl RulesEngine for SuddenDeath {
    type Board = Tally;

    fn initial_board(&self) -> Tally {
        Tally::default()
    }

    fn apply_move(
        &self,
        board: &Tally,
        notation: &Notation,
        side: Side,
    ) -> Result<(Tally, MoveDescriptor), GameError> {
        if notation.as_str() == "h8h8" {
            return Err(GameError::IllegalMove("h8h8".into()));
        }
        let winner = (notation.as_str() == "a1a1").then_some(side);
        Ok((
            Tally {
                plies: board.plies + 1,
                winner,
            },
            MoveDescriptor {
                uci: notation.to_string(),
                san: notation.to_string(),
            },
        ))
    }

    fn encode_board(&self, board: &Tally) -> EncodedBoard {
        EncodedBoard {
            squares: START_BOARD.into(),
            moved: format!("{:06}", board.plies),
            pawn_move: None,
        }
    }

    fn decode_board(&self, encoded: &EncodedBoard, _turn: Side) -> Result<Tally, GameError> {
        let plies = encoded
            .moved
            .parse()
            .map_err(|_| GameError::CorruptRecord(encoded.moved.clone()))?;
        Ok(Tally {
            plies,
            winner: None,
        })
    }

    fn status(&self, board: &Tally) -> Status {
        match board.winner {
            Some(winner) => Status::Decisive { winner },
            None => Status::Ongoing,
        }
    }
}

#[tokio::test]
async fn engine_outcomes_drive_termination() {
    let store = Arc::new(MemoryStore::new());
    let mut session = MatchSession::open_with_engine(
        SuddenDeath,
        store.clone(),
        key(),
        PlayerNames::default(),
        SyncMode::Auto,
    )
    .await
    .unwrap();

    session.apply_moves(["b1b2", "c1c2"]).await.unwrap();
    assert_eq!(store.get_match(&key()).await.unwrap().unwrap().moved, "000002");

    let err = session.apply_move("h8h8").await.unwrap_err();
    assert!(matches!(err, GameError::IllegalMove(_)));
    assert_eq!(session.turn(), Side::White);

    let result = session.apply_move("a1a1").await.unwrap();
    assert_eq!(
        result.status,
        Status::Decisive {
            winner: Side::White
        }
    );
    assert!(result.reaped);
    assert!(store.get_match(&key()).await.unwrap().is_none());
}
