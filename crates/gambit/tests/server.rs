//! Integration tests for the Gambit server: hello/auth, matchmaking,
//! move relay, the draw sub-protocol, and terminal handoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gambit::prelude::*;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address plus the
/// recorder, so tests can inspect what was persisted.
async fn start_server() -> (String, Arc<MemoryRecorder>) {
    let recorder = Arc::new(MemoryRecorder::new());
    let server = GambitServerBuilder::new()
        .bind("127.0.0.1:0")
        .recorder(recorder.clone())
        .build(GuestAuthenticator)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, recorder)
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send frame");
}

async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("server should respond")
        .unwrap()
        .expect("recv frame");
    serde_json::from_slice(&msg.into_data()).expect("decode server event")
}

/// Sends `hello` with the given token and returns the welcomed identity.
async fn hello(ws: &mut ClientWs, token: Option<&str>) -> PlayerIdentity {
    send_json(ws, json!({ "event": "hello", "token": token })).await;
    match recv_event(ws).await {
        ServerEvent::Welcome { identity } => identity,
        other => panic!("expected welcome, got {other:?}"),
    }
}

/// Connects two players and pairs them into one session.
///
/// Returns both sockets and the session id; the creator has already
/// consumed the `opponent-joined` notice.
async fn start_game(addr: &str) -> (ClientWs, ClientWs, SessionId) {
    let mut white = connect(addr).await;
    hello(&mut white, Some("alice")).await;
    send_json(&mut white, json!({ "event": "join-or-create" })).await;
    let session_id = match recv_event(&mut white).await {
        ServerEvent::SessionCreated { session_id, seat } => {
            assert_eq!(seat, Seat::White);
            session_id
        }
        other => panic!("expected session-created, got {other:?}"),
    };

    let mut black = connect(addr).await;
    hello(&mut black, Some("bob")).await;
    send_json(&mut black, json!({ "event": "join-or-create" })).await;
    match recv_event(&mut black).await {
        ServerEvent::SessionJoined {
            session_id: joined,
            seat,
            opponent,
        } => {
            assert_eq!(joined, session_id);
            assert_eq!(seat, Seat::Black);
            assert_eq!(opponent, PlayerIdentity::Registered("alice".into()));
        }
        other => panic!("expected session-joined, got {other:?}"),
    }

    match recv_event(&mut white).await {
        ServerEvent::OpponentJoined { opponent } => {
            assert_eq!(opponent, PlayerIdentity::Registered("bob".into()));
        }
        other => panic!("expected opponent-joined, got {other:?}"),
    }

    (white, black, session_id)
}

fn move_frame(session_id: &SessionId, from: &str, to: &str) -> serde_json::Value {
    json!({
        "event": "move",
        "session_id": session_id.0,
        "from": from,
        "to": to,
    })
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_hello_with_token_welcomes_registered() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    let identity = hello(&mut ws, Some("alice")).await;
    assert_eq!(identity, PlayerIdentity::Registered("alice".into()));
}

#[tokio::test]
async fn test_hello_without_token_welcomes_guest() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    let identity = hello(&mut ws, None).await;
    assert!(identity.is_guest());
}

#[tokio::test]
async fn test_first_frame_must_be_hello() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({ "event": "heartbeat" })).await;
    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected error 400, got {other:?}"),
    }
}

#[tokio::test]
async fn test_heartbeat_acked() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;
    hello(&mut ws, Some("alice")).await;

    send_json(&mut ws, json!({ "event": "heartbeat" })).await;
    assert!(matches!(
        recv_event(&mut ws).await,
        ServerEvent::HeartbeatAck
    ));
}

#[tokio::test]
async fn test_unknown_event_ignored_connection_survives() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;
    hello(&mut ws, Some("alice")).await;

    send_json(&mut ws, json!({ "event": "no-such-event", "x": 1 })).await;
    send_json(&mut ws, json!("not even an object")).await;

    // The connection is still alive and responsive.
    send_json(&mut ws, json!({ "event": "heartbeat" })).await;
    assert!(matches!(
        recv_event(&mut ws).await,
        ServerEvent::HeartbeatAck
    ));
}

#[tokio::test]
async fn test_moves_relayed_to_both_players() {
    let (addr, _) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    send_json(&mut white, move_frame(&session_id, "e2", "e4")).await;

    for ws in [&mut white, &mut black] {
        match recv_event(ws).await {
            ServerEvent::PositionUpdated {
                session_id: sid,
                position,
                last_move,
            } => {
                assert_eq!(sid, session_id);
                assert!(position.contains(" b "));
                assert_eq!(last_move.from, "e2");
                assert_eq!(last_move.to, "e4");
                assert_eq!(last_move.ply, 1);
            }
            other => panic!("expected position-updated, got {other:?}"),
        }
    }

    // Black replies; both see ply 2.
    send_json(&mut black, move_frame(&session_id, "e7", "e5")).await;
    for ws in [&mut white, &mut black] {
        match recv_event(ws).await {
            ServerEvent::PositionUpdated { last_move, .. } => {
                assert_eq!(last_move.ply, 2);
            }
            other => panic!("expected position-updated, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_legacy_field_names_accepted() {
    let (addr, _) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    // Older clients say source/target instead of from/to.
    send_json(
        &mut white,
        json!({
            "event": "move",
            "session_id": session_id.0,
            "source": "e2",
            "target": "e4",
        }),
    )
    .await;

    match recv_event(&mut black).await {
        ServerEvent::PositionUpdated { last_move, .. } => {
            assert_eq!(last_move.from, "e2");
            assert_eq!(last_move.to, "e4");
        }
        other => panic!("expected position-updated, got {other:?}"),
    }
}

#[tokio::test]
async fn test_illegal_move_rejected_without_state_change() {
    let (addr, _) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    send_json(&mut white, move_frame(&session_id, "e2", "e5")).await;
    match recv_event(&mut white).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 422),
        other => panic!("expected error 422, got {other:?}"),
    }

    // The ply did not advance: a legal white move still works.
    send_json(&mut white, move_frame(&session_id, "e2", "e4")).await;
    assert!(matches!(
        recv_event(&mut black).await,
        ServerEvent::PositionUpdated { .. }
    ));
}

#[tokio::test]
async fn test_out_of_turn_move_rejected() {
    let (addr, _) = start_server().await;
    let (_white, mut black, session_id) = start_game(&addr).await;

    send_json(&mut black, move_frame(&session_id, "e7", "e5")).await;
    match recv_event(&mut black).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 403),
        other => panic!("expected error 403, got {other:?}"),
    }
}

#[tokio::test]
async fn test_resign_finishes_and_records_once() {
    let (addr, recorder) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    send_json(&mut black, json!({ "event": "resign", "session_id": session_id.0 }))
        .await;

    for ws in [&mut white, &mut black] {
        match recv_event(ws).await {
            ServerEvent::SessionTerminal {
                outcome, reason, ..
            } => {
                assert_eq!(outcome, Outcome::Win(Seat::White));
                assert_eq!(reason, OutcomeReason::Resignation);
            }
            other => panic!("expected session-terminal, got {other:?}"),
        }
    }

    assert_eq!(recorder.recorded(), 1);
    let record = recorder.record_for(&session_id).expect("recorded game");
    let adjustments = record.adjustments.expect("rated game");
    assert_eq!(adjustments[0].delta + adjustments[1].delta, 0);

    // Events after the terminal state are rejected.
    send_json(&mut black, json!({ "event": "resign", "session_id": session_id.0 }))
        .await;
    match recv_event(&mut black).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 410),
        other => panic!("expected error 410, got {other:?}"),
    }
    assert_eq!(recorder.recorded(), 1);
}

#[tokio::test]
async fn test_draw_offer_accept_flow() {
    let (addr, recorder) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    send_json(
        &mut white,
        json!({ "event": "offer-draw", "session_id": session_id.0 }),
    )
    .await;
    match recv_event(&mut black).await {
        ServerEvent::DrawOffered { by } => assert_eq!(by, Seat::White),
        other => panic!("expected draw-offered, got {other:?}"),
    }

    send_json(
        &mut black,
        json!({ "event": "accept-draw", "session_id": session_id.0 }),
    )
    .await;
    for ws in [&mut white, &mut black] {
        match recv_event(ws).await {
            ServerEvent::SessionTerminal {
                outcome, reason, ..
            } => {
                assert_eq!(outcome, Outcome::Draw);
                assert_eq!(reason, OutcomeReason::DrawAgreement);
            }
            other => panic!("expected session-terminal, got {other:?}"),
        }
    }

    let record = recorder.record_for(&session_id).expect("recorded game");
    assert_eq!(record.outcome, Outcome::Draw);
}

#[tokio::test]
async fn test_draw_decline_notifies_offerer() {
    let (addr, _) = start_server().await;
    let (mut white, mut black, session_id) = start_game(&addr).await;

    send_json(
        &mut white,
        json!({ "event": "offer-draw", "session_id": session_id.0 }),
    )
    .await;
    match recv_event(&mut black).await {
        ServerEvent::DrawOffered { .. } => {}
        other => panic!("expected draw-offered, got {other:?}"),
    }

    send_json(
        &mut black,
        json!({ "event": "decline-draw", "session_id": session_id.0 }),
    )
    .await;
    match recv_event(&mut white).await {
        ServerEvent::DrawDeclined { by } => assert_eq!(by, Seat::Black),
        other => panic!("expected draw-declined, got {other:?}"),
    }

    // The game goes on.
    send_json(&mut white, move_frame(&session_id, "e2", "e4")).await;
    assert!(matches!(
        recv_event(&mut white).await,
        ServerEvent::PositionUpdated { .. }
    ));
}

#[tokio::test]
async fn test_accept_without_offer_rejected() {
    let (addr, _) = start_server().await;
    let (mut white, _black, session_id) = start_game(&addr).await;

    send_json(
        &mut white,
        json!({ "event": "accept-draw", "session_id": session_id.0 }),
    )
    .await;
    match recv_event(&mut white).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 403),
        other => panic!("expected error 403, got {other:?}"),
    }
}

#[tokio::test]
async fn test_move_on_unknown_session_rejected() {
    let (addr, _) = start_server().await;
    let mut ws = connect(&addr).await;
    hello(&mut ws, Some("alice")).await;

    send_json(
        &mut ws,
        json!({ "event": "move", "session_id": "nope", "from": "e2", "to": "e4" }),
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected error 404, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_notifies_opponent() {
    let (addr, _) = start_server().await;
    let (mut white, black, _session_id) = start_game(&addr).await;

    drop(black);

    match recv_event(&mut white).await {
        ServerEvent::OpponentDisconnected => {}
        other => panic!("expected opponent-disconnected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_guest_game_recorded_unrated() {
    let (addr, recorder) = start_server().await;

    let mut white = connect(&addr).await;
    hello(&mut white, Some("alice")).await;
    send_json(&mut white, json!({ "event": "join-or-create" })).await;
    let session_id = match recv_event(&mut white).await {
        ServerEvent::SessionCreated { session_id, .. } => session_id,
        other => panic!("expected session-created, got {other:?}"),
    };

    let mut guest = connect(&addr).await;
    hello(&mut guest, None).await;
    send_json(&mut guest, json!({ "event": "join-or-create" })).await;
    match recv_event(&mut guest).await {
        ServerEvent::SessionJoined { .. } => {}
        other => panic!("expected session-joined, got {other:?}"),
    }
    match recv_event(&mut white).await {
        ServerEvent::OpponentJoined { .. } => {}
        other => panic!("expected opponent-joined, got {other:?}"),
    }

    send_json(
        &mut guest,
        json!({ "event": "resign", "session_id": session_id.0 }),
    )
    .await;
    match recv_event(&mut white).await {
        ServerEvent::SessionTerminal { outcome, .. } => {
            assert_eq!(outcome, Outcome::Win(Seat::White));
        }
        other => panic!("expected session-terminal, got {other:?}"),
    }

    let record = recorder.record_for(&session_id).expect("recorded game");
    assert!(record.adjustments.is_none());
}
