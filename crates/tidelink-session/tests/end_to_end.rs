//! End-to-end tests: a client session and a server session over loopback.
//!
//! Both sessions tick in the same test task, yielding briefly between
//! frames so the socket tasks can run.

use std::time::Duration;

use tidelink_protocol::{
    Command, ControlRequest, ResultCode, RoomRequestResult, Snapshot, WireRecord,
};
use tidelink_room::{CommandProcessor, RoomBatch};
use tidelink_session::{
    ClientConfig, ClientSession, ClientState, ServerConfig, ServerSession, SessionError, Ticket,
};
use tidelink_transport::{
    ConnectionId, DisconnectReason, DriverConfig, NetworkDriver, NetworkEvent, Pipeline,
};

// =========================================================================
// Helpers
// =========================================================================

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: usize = 400;

fn driver_config() -> DriverConfig {
    DriverConfig {
        connect_timeout: Duration::from_millis(100),
        max_connect_attempts: 3,
        disconnect_timeout: Duration::from_secs(5),
        heartbeat_interval: Duration::from_millis(100),
    }
}

fn server() -> ServerSession {
    let config = ServerConfig {
        driver: driver_config(),
        ..ServerConfig::default()
    };
    ServerSession::listen("127.0.0.1:0", config).unwrap()
}

fn client() -> ClientSession {
    ClientSession::new(ClientConfig {
        driver: driver_config(),
        snapshot_capacity: 8,
    })
    .unwrap()
}

async fn yield_frame() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Ticks both sides until `ticket` resolves.
async fn resolve<T>(
    server: &mut ServerSession,
    client: &mut ClientSession,
    ticket: &mut Ticket<T>,
) -> Result<T, SessionError> {
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        client.tick();
        if let Some(outcome) = ticket.try_result() {
            return outcome;
        }
        yield_frame().await;
    }
    panic!("ticket did not resolve");
}

/// Ticks both sides until `done` holds.
async fn tick_until(
    server: &mut ServerSession,
    client: &mut ClientSession,
    mut done: impl FnMut(&ServerSession, &ClientSession) -> bool,
) {
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        client.tick();
        if done(server, client) {
            return;
        }
        yield_frame().await;
    }
    panic!("condition not reached");
}

/// Records every command it is handed, and which rooms sent any.
#[derive(Default)]
struct Collector {
    commands: Vec<Command>,
    rooms: Vec<String>,
}

impl CommandProcessor for Collector {
    fn process(&mut self, batch: &RoomBatch) {
        if batch.is_empty() {
            return;
        }
        let room = batch.room_id().to_string();
        if !self.rooms.contains(&room) {
            self.rooms.push(room);
        }
        self.commands.extend(batch.commands().copied());
    }
}

async fn connected_pair() -> (ServerSession, ClientSession) {
    let mut server = server();
    let mut client = client();
    let port = server.local_addr().unwrap().port();

    let mut ticket = client.connect_to("127.0.0.1", port).unwrap();
    resolve(&mut server, &mut client, &mut ticket).await.unwrap();
    assert_eq!(client.state(), ClientState::Connected);
    tick_until(&mut server, &mut client, |s, _| s.unclaimed_count() == 1).await;
    (server, client)
}

/// A bare driver connected to `server` and sitting in its unclaimed
/// pool, for sending hand-crafted payloads.
async fn raw_peer(server: &mut ServerSession) -> (NetworkDriver, ConnectionId) {
    let mut peer = NetworkDriver::new(driver_config()).unwrap();
    let conn = peer.connect(server.local_addr().unwrap());
    let mut connected = false;
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        peer.update();
        if !connected {
            connected = peer.pop_event(conn) == Some(NetworkEvent::Connect);
        }
        if connected && server.unclaimed_count() == 1 {
            return (peer, conn);
        }
        yield_frame().await;
    }
    panic!("raw peer never became unclaimed");
}

/// Ticks until the server answers `peer` on the reliable pipeline.
async fn next_reply(
    server: &mut ServerSession,
    peer: &mut NetworkDriver,
    conn: ConnectionId,
) -> RoomRequestResult {
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        peer.update();
        if let Some(NetworkEvent::Data {
            pipeline: Pipeline::ReliableSequenced,
            payload,
        }) = peer.pop_event(conn)
        {
            return RoomRequestResult::decode(&payload).unwrap();
        }
        yield_frame().await;
    }
    panic!("no reply from server");
}

// =========================================================================
// Connect
// =========================================================================

#[tokio::test]
async fn test_connect_live_listener_resolves() {
    let (server, client) = connected_pair().await;
    assert_eq!(server.unclaimed_count(), 1);
    assert!(client.connection().is_some());
}

#[tokio::test]
async fn test_connect_bad_address_fails_immediately() {
    let mut client = client();
    for bad in ["1.2.3.4", "host:notanumber", ":80", "1.2.3.4:"] {
        assert!(
            matches!(client.connect(bad), Err(SessionError::AddressParse(_))),
            "{bad} should not parse"
        );
    }
    assert_eq!(client.state(), ClientState::Idle);
}

#[tokio::test]
async fn test_connect_without_listener_rejects_with_reason() {
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let mut client = client();
    let mut ticket = client.connect_to("127.0.0.1", port).unwrap();

    let mut outcome = None;
    for _ in 0..MAX_FRAMES {
        client.tick();
        if let Some(result) = ticket.try_result() {
            outcome = Some(result);
            break;
        }
        yield_frame().await;
    }
    assert!(matches!(
        outcome,
        Some(Err(SessionError::ConnectFailed(DisconnectReason::MaxConnectionAttempts)))
    ));
    assert_eq!(client.state(), ClientState::Disconnected);
}

// =========================================================================
// Unclaimed pool
// =========================================================================

#[tokio::test]
async fn test_unclaimed_timeout_evicts_connection() {
    let (mut server, mut client) = connected_pair().await;

    server.tick(Duration::from_secs(10));
    assert_eq!(server.unclaimed_count(), 0);

    tick_until(&mut server, &mut client, |_, c| {
        c.state() == ClientState::Disconnected
    })
    .await;
    assert_eq!(client.disconnect_reason(), Some(DisconnectReason::ClosedByRemote));
}

#[tokio::test]
async fn test_unclaimed_disconnect_leaves_pool() {
    let (mut server, mut client) = connected_pair().await;
    client.disconnect();

    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        if server.unclaimed_count() == 0 {
            return;
        }
        yield_frame().await;
    }
    panic!("unclaimed entry not removed");
}

// =========================================================================
// Join protocol
// =========================================================================

#[tokio::test]
async fn test_join_room_known_id_claims_connection() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("lobby")).unwrap();

    let mut ticket = client.join_room("lobby").unwrap();
    let room = resolve(&mut server, &mut client, &mut ticket).await.unwrap();

    assert_eq!(room.as_str(), "lobby");
    assert_eq!(server.unclaimed_count(), 0);
    assert_eq!(server.room("lobby").unwrap().member_count(), 1);
}

#[tokio::test]
async fn test_join_room_unknown_id_keeps_unclaimed() {
    let (mut server, mut client) = connected_pair().await;

    let mut ticket = client.join_room("nowhere").unwrap();
    let err = resolve(&mut server, &mut client, &mut ticket).await.unwrap_err();

    match err {
        SessionError::RoomRejected { code, reason } => {
            assert_eq!(code, ResultCode::RoomNotFound);
            assert_ne!(code.to_i32(), 0);
            assert_eq!(reason, "room 'nowhere' not found");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.unclaimed_count(), 1);
}

#[tokio::test]
async fn test_join_room_full_is_rejected() {
    let config = ServerConfig {
        driver: driver_config(),
        room: tidelink_room::RoomConfig {
            capacity: 0,
            ..Default::default()
        },
        ..ServerConfig::default()
    };
    let mut server = ServerSession::listen("127.0.0.1:0", config).unwrap();
    server.create_room(Some("tiny")).unwrap();
    let mut client = client();
    let port = server.local_addr().unwrap().port();
    let mut connect = client.connect_to("127.0.0.1", port).unwrap();
    resolve(&mut server, &mut client, &mut connect).await.unwrap();

    let mut ticket = client.join_room("tiny").unwrap();
    let err = resolve(&mut server, &mut client, &mut ticket).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::RoomRejected { code: ResultCode::RoomFull, .. }
    ));
}

#[tokio::test]
async fn test_unclaimed_unreliable_data_is_ignored() {
    let mut server = server();
    server.create_room(Some("lobby")).unwrap();
    let (mut peer, conn) = raw_peer(&mut server).await;
    let join = ControlRequest::JoinRoom("lobby".into()).to_bytes().unwrap();

    peer.send(Pipeline::UnreliableSequenced, conn, &join).unwrap();
    for _ in 0..30 {
        server.tick(FRAME);
        peer.update();
        assert_eq!(peer.pop_event(conn), None);
        yield_frame().await;
    }
    assert_eq!(server.unclaimed_count(), 1);
    assert_eq!(server.room("lobby").unwrap().member_count(), 0);

    // The same bytes on the reliable pipeline are a valid join.
    peer.send(Pipeline::ReliableSequenced, conn, &join).unwrap();
    let reply = next_reply(&mut server, &mut peer, conn).await;
    assert!(reply.is_success());
    assert_eq!(server.unclaimed_count(), 0);
}

#[tokio::test]
async fn test_malformed_control_request_gets_invalid_request() {
    let mut server = server();
    let (mut peer, conn) = raw_peer(&mut server).await;

    for payload in [&[0x07][..], &[0x00, 0xff][..], &[][..]] {
        peer.send(Pipeline::ReliableSequenced, conn, payload).unwrap();
        let reply = next_reply(&mut server, &mut peer, conn).await;
        assert_eq!(reply.code, ResultCode::InvalidRequest, "payload {payload:?}");
        assert!(!reply.room_id_or_reason.is_empty());
        assert_eq!(server.unclaimed_count(), 1);
    }
}

#[tokio::test]
async fn test_room_requests_after_join_are_refused() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("arena")).unwrap();
    server.create_room(Some("lobby")).unwrap();
    let mut join = client.join_room("arena").unwrap();
    resolve(&mut server, &mut client, &mut join).await.unwrap();
    assert_eq!(client.room().map(|r| r.as_str()), Some("arena"));

    assert!(matches!(
        client.join_room("lobby"),
        Err(SessionError::InvalidState(_))
    ));
    assert!(matches!(
        client.create_room(),
        Err(SessionError::InvalidState(_))
    ));

    // Only real commands reach the room.
    client.send(Command::new(0, 9));
    let mut collector = Collector::default();
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        client.tick();
        server.dispatch(&mut collector);
        if !collector.commands.is_empty() {
            break;
        }
        yield_frame().await;
    }
    for _ in 0..10 {
        server.tick(FRAME);
        client.tick();
        server.dispatch(&mut collector);
        yield_frame().await;
    }
    assert_eq!(collector.commands, vec![Command::new(0, 9)]);
    assert_eq!(server.room("lobby").unwrap().member_count(), 0);
}

#[tokio::test]
async fn test_create_room_then_join() {
    let (mut server, mut client) = connected_pair().await;

    let mut create = client.create_room().unwrap();
    let room_id = resolve(&mut server, &mut client, &mut create).await.unwrap();
    assert_eq!(room_id.as_str().len(), 6);
    assert!(server.room(room_id.as_str()).unwrap().members().is_empty());
    assert_eq!(server.unclaimed_count(), 1);

    let mut join = client.join_room(room_id.as_str()).unwrap();
    let joined = resolve(&mut server, &mut client, &mut join).await.unwrap();
    assert_eq!(joined, room_id);
    assert_eq!(server.unclaimed_count(), 0);
}

// =========================================================================
// Commands and snapshots
// =========================================================================

#[tokio::test]
async fn test_commands_reach_room_batch_in_order() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("arena")).unwrap();
    let mut join = client.join_room("arena").unwrap();
    resolve(&mut server, &mut client, &mut join).await.unwrap();

    for (sequence, value) in [(0, 1), (1, 3), (2, 2), (3, 4)] {
        client.send(Command::new(sequence, value));
    }

    let mut collector = Collector::default();
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        client.tick();
        server.dispatch(&mut collector);
        if collector.commands.len() >= 4 {
            break;
        }
        yield_frame().await;
    }

    assert_eq!(collector.rooms, vec!["arena".to_string()]);
    assert_eq!(
        collector.commands,
        vec![
            Command::new(0, 1),
            Command::new(1, 3),
            Command::new(2, 2),
            Command::new(3, 4),
        ]
    );
}

#[tokio::test]
async fn test_member_disconnect_leaves_room() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("arena")).unwrap();
    let mut join = client.join_room("arena").unwrap();
    resolve(&mut server, &mut client, &mut join).await.unwrap();

    client.disconnect();
    for _ in 0..MAX_FRAMES {
        server.tick(FRAME);
        if server.room("arena").unwrap().member_count() == 0 {
            return;
        }
        yield_frame().await;
    }
    panic!("member not removed");
}

#[tokio::test]
async fn test_broadcast_snapshot_lands_in_ring_buffer() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("arena")).unwrap();
    let mut join = client.join_room("arena").unwrap();
    resolve(&mut server, &mut client, &mut join).await.unwrap();

    for sequence in 0..3 {
        let sent = server
            .broadcast_snapshot("arena", Snapshot::new(sequence, sequence * 10))
            .unwrap();
        assert_eq!(sent, 1);
    }

    tick_until(&mut server, &mut client, |_, c| c.snapshots().latest() == Some(2)).await;
    assert_eq!(client.snapshot(1), Some(&Snapshot::new(1, 10)));
    assert_eq!(client.latest_snapshot(), Some(&Snapshot::new(2, 20)));
}

#[tokio::test]
async fn test_remove_room_disconnects_members() {
    let (mut server, mut client) = connected_pair().await;
    server.create_room(Some("arena")).unwrap();
    let mut join = client.join_room("arena").unwrap();
    resolve(&mut server, &mut client, &mut join).await.unwrap();

    server.remove_room("arena").unwrap();
    assert!(server.room("arena").is_none());

    tick_until(&mut server, &mut client, |_, c| {
        c.state() == ClientState::Disconnected
    })
    .await;
}

#[tokio::test]
async fn test_server_shutdown_disconnects_clients() {
    let (mut server, mut client) = connected_pair().await;
    server.shutdown();
    assert_eq!(server.unclaimed_count(), 0);

    for _ in 0..MAX_FRAMES {
        client.tick();
        if client.state() == ClientState::Disconnected {
            return;
        }
        yield_frame().await;
    }
    panic!("client never saw the shutdown");
}

#[tokio::test]
async fn test_server_shutdown_refuses_new_clients() {
    let (mut server, _client) = connected_pair().await;
    let port = server.local_addr().unwrap().port();
    server.shutdown();
    assert_eq!(server.local_addr(), None);

    let mut late = client();
    let mut connect = late.connect_to("127.0.0.1", port).unwrap();
    let outcome = resolve(&mut server, &mut late, &mut connect).await;
    assert!(matches!(
        outcome,
        Err(SessionError::ConnectFailed(DisconnectReason::MaxConnectionAttempts))
    ));
    assert_eq!(late.state(), ClientState::Disconnected);
    assert_eq!(server.unclaimed_count(), 0);
}
