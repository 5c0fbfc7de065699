//! End-to-end tests using real WebSocket clients against a bound server.

use std::net::SocketAddr;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use rendezvous_core::RoomName;
use rendezvous_server::{RendezvousServer, ServerConfig};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot a server on an ephemeral loopback port.
async fn boot_server(config: ServerConfig) -> (SocketAddr, RendezvousServer) {
    let server = RendezvousServer::new(config);
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

async fn boot_default() -> (SocketAddr, RendezvousServer) {
    boot_server(ServerConfig::default()).await
}

/// Connect and consume the `connected` greeting. Returns the client ID.
async fn connect(addr: SocketAddr) -> (WsStream, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let greeting = recv(&mut ws).await;
    assert_eq!(greeting["type"], "connected");
    let id = greeting["data"]["clientId"].as_str().unwrap().to_owned();
    (ws, id)
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next JSON event, skipping control frames.
async fn recv_within(ws: &mut WsStream, limit: Duration) -> Value {
    loop {
        let msg = timeout(limit, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn recv(ws: &mut WsStream) -> Value {
    recv_within(ws, TIMEOUT).await
}

/// Assert no event arrives within a short window.
async fn expect_silence(ws: &mut WsStream) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(300);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {}
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}

/// Wait for the socket to be closed by the server.
async fn expect_closed(ws: &mut WsStream) {
    loop {
        match timeout(TIMEOUT, ws.next()).await.expect("socket not closed") {
            None | Some(Err(_) | Ok(Message::Close(_))) => return,
            Some(Ok(_)) => {}
        }
    }
}

async fn join(ws: &mut WsStream, room: &str) -> Value {
    send(ws, json!({"type": "join", "data": room})).await;
    recv(ws).await
}

/// Two clients in `room`, greetings and join notifications consumed.
async fn pair(addr: SocketAddr, room: &str) -> (WsStream, WsStream) {
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    assert_eq!(join(&mut a, room).await["type"], "created");
    assert_eq!(join(&mut b, room).await["type"], "joined");
    assert_eq!(recv(&mut a).await, json!({"type": "new_peer", "data": room}));
    (a, b)
}

#[tokio::test]
async fn greeting_carries_unique_client_id() {
    let (addr, server) = boot_default().await;
    let (_a, id_a) = connect(addr).await;
    let (_b, id_b) = connect(addr).await;
    assert!(id_a.starts_with("conn_"));
    assert_ne!(id_a, id_b);
    assert_eq!(server.hub().connection_count(), 2);
}

#[tokio::test]
async fn create_join_and_full() {
    let (addr, _server) = boot_default().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let (mut c, _) = connect(addr).await;

    assert_eq!(join(&mut a, "R").await, json!({"type": "created", "data": "R"}));
    assert_eq!(join(&mut b, "R").await, json!({"type": "joined", "data": "R"}));
    assert_eq!(recv(&mut a).await, json!({"type": "new_peer", "data": "R"}));

    assert_eq!(join(&mut c, "R").await, json!({"type": "full", "data": "R"}));
    expect_silence(&mut a).await;
    expect_silence(&mut b).await;
}

#[tokio::test]
async fn offer_answer_and_candidates_reach_only_the_peer() {
    let (addr, _server) = boot_default().await;
    let (mut a, mut b) = pair(addr, "R").await;
    let (mut c, mut d) = pair(addr, "S").await;

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n"});
    send(&mut a, json!({"type": "invite", "data": offer})).await;
    assert_eq!(recv(&mut b).await, json!({"type": "invite", "data": offer}));

    let answer = json!({"type": "answer", "sdp": "v=0\r\n"});
    send(&mut b, json!({"type": "ok", "data": answer})).await;
    assert_eq!(recv(&mut a).await, json!({"type": "ok", "data": answer}));

    let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.1 5000 typ host", "sdpMid": "0"});
    send(&mut a, json!({"type": "ice_candidate", "data": candidate})).await;
    assert_eq!(
        recv(&mut b).await,
        json!({"type": "ice_candidate", "data": candidate})
    );

    expect_silence(&mut a).await;
    expect_silence(&mut c).await;
    expect_silence(&mut d).await;
}

#[tokio::test]
async fn bye_notifies_peer_and_frees_slot() {
    let (addr, server) = boot_default().await;
    let (mut a, mut b) = pair(addr, "R").await;

    send(&mut b, json!({"type": "bye", "data": "R"})).await;
    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));
    expect_silence(&mut b).await;

    let (mut c, _) = connect(addr).await;
    assert_eq!(join(&mut c, "R").await["type"], "joined");
    assert_eq!(recv(&mut a).await["type"], "new_peer");
    server.hub().check_invariants().unwrap();
}

#[tokio::test]
async fn disconnect_notifies_peer_and_cleans_up() {
    let (addr, server) = boot_default().await;
    let (mut a, b) = pair(addr, "R").await;

    drop(b);
    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));

    let (mut c, _) = connect(addr).await;
    assert_eq!(join(&mut c, "R").await["type"], "joined");
    assert_eq!(server.hub().connection_count(), 2);
    server.hub().check_invariants().unwrap();
}

#[tokio::test]
async fn close_frame_notifies_peer() {
    let (addr, _server) = boot_default().await;
    let (mut a, mut b) = pair(addr, "R").await;
    b.close(None).await.unwrap();
    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));
}

#[tokio::test]
async fn protocol_errors_go_to_sender_only() {
    let (addr, _server) = boot_default().await;
    let (mut a, mut b) = pair(addr, "R").await;
    let (mut c, _) = connect(addr).await;

    send(&mut c, json!({"type": "invite", "data": {"sdp": "x"}})).await;
    let err = recv(&mut c).await;
    assert_eq!(err["type"], "error");
    assert_eq!(err["data"]["code"], "NOT_IN_ROOM");

    c.send(Message::text("{not json")).await.unwrap();
    assert_eq!(recv(&mut c).await["data"]["code"], "INVALID_MESSAGE");

    send(&mut c, json!({"type": "teleport", "data": 1})).await;
    assert_eq!(recv(&mut c).await["data"]["code"], "INVALID_MESSAGE");

    send(&mut c, json!({"type": "join", "data": "   "})).await;
    assert_eq!(recv(&mut c).await["data"]["code"], "INVALID_ROOM");

    send(&mut a, json!({"type": "join", "data": "R"})).await;
    assert_eq!(recv(&mut a).await["data"]["code"], "ALREADY_IN_ROOM");

    send(&mut c, json!({"type": "bye", "data": "R"})).await;
    assert_eq!(recv(&mut c).await["data"]["code"], "NOT_IN_ROOM");

    expect_silence(&mut b).await;
}

#[tokio::test]
async fn binary_frames_are_accepted() {
    let (addr, _server) = boot_default().await;
    let (mut a, _) = connect(addr).await;
    let frame = json!({"type": "join", "data": "bin"}).to_string().into_bytes();
    a.send(Message::binary(frame)).await.unwrap();
    assert_eq!(recv(&mut a).await, json!({"type": "created", "data": "bin"}));

    a.send(Message::binary(vec![0xff, 0xfe, 0x00])).await.unwrap();
    assert_eq!(recv(&mut a).await["data"]["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn switching_rooms_says_bye_to_old_peer() {
    let (addr, _server) = boot_default().await;
    let (mut a, mut b) = pair(addr, "R").await;
    assert_eq!(join(&mut b, "S").await, json!({"type": "created", "data": "S"}));
    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));
}

#[tokio::test]
async fn oversized_message_drops_sender() {
    let (addr, _server) = boot_server(ServerConfig {
        max_message_size: 1024,
        ..ServerConfig::default()
    })
    .await;
    let (mut a, mut b) = pair(addr, "R").await;

    let huge = "x".repeat(4096);
    let _ = b
        .send(Message::text(json!({"type": "invite", "data": huge}).to_string()))
        .await;
    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));
}

#[tokio::test]
async fn slow_reader_is_evicted_and_peer_notified() {
    let (addr, server) = boot_server(ServerConfig {
        outbound_queue: 2,
        ..ServerConfig::default()
    })
    .await;
    let (mut a, b) = pair(addr, "R").await;

    // `b` never reads: its socket buffers fill, then its outbound queue.
    let blob = "x".repeat(60 * 1024);
    for _ in 0..2000 {
        if server.hub().connection_count() == 1 {
            break;
        }
        send(&mut a, json!({"type": "invite", "data": blob})).await;
    }

    assert_eq!(recv(&mut a).await, json!({"type": "bye", "data": "R"}));
    assert_eq!(server.hub().connection_count(), 1);
    assert_eq!(server.hub().room_size(&RoomName::parse("R").unwrap()), 1);
    server.hub().check_invariants().unwrap();
    drop(b);
}

#[tokio::test]
async fn connection_limit_returns_503() {
    let (addr, server) = boot_server(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let (mut first, _) = connect(addr).await;

    let err = connect_async(format!("ws://{addr}/ws")).await.unwrap_err();
    assert_matches!(err, tungstenite::Error::Http(resp) if resp.status() == 503);

    first.close(None).await.unwrap();
    expect_closed(&mut first).await;

    // The slot is released once the first session has fully ended.
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    let mut second = loop {
        if let Ok((mut ws, _)) = connect_async(format!("ws://{addr}/ws")).await {
            assert_eq!(recv(&mut ws).await["type"], "connected");
            break ws;
        }
        assert!(tokio::time::Instant::now() < deadline, "slot never released");
        tokio::time::sleep(Duration::from_millis(50)).await;
    };
    assert_eq!(server.hub().connection_count(), 1);
    second.close(None).await.unwrap();
}

#[tokio::test]
async fn silent_client_is_dropped_by_heartbeat() {
    let (addr, server) = boot_server(ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 2,
        ..ServerConfig::default()
    })
    .await;
    let (mut a, b) = pair(addr, "R").await;

    // `b` is never polled again, so it never answers pings.
    let bye = recv_within(&mut a, Duration::from_secs(10)).await;
    assert_eq!(bye, json!({"type": "bye", "data": "R"}));
    assert_eq!(server.hub().connection_count(), 1);
    drop(b);
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let server = RendezvousServer::new(ServerConfig::default());
    let (addr, handle) = server.listen().await.unwrap();
    let (mut a, _) = connect(addr).await;

    assert!(server.shutdown().drain(handle, TIMEOUT).await);
    expect_closed(&mut a).await;
    assert_eq!(server.hub().connection_count(), 0);

    let err = connect_async(format!("ws://{addr}/ws")).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn health_reports_connections_and_rooms() {
    let (addr, _server) = boot_default().await;
    let (_a, _b) = pair(addr, "R").await;
    let (_c, _) = connect(addr).await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 3);
    assert_eq!(body["rooms"], 1);
}
