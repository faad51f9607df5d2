//! Integration tests for the network driver over real loopback sockets.
//!
//! Both drivers live in the same test task. Each "tick" runs `update` on
//! both and then yields briefly so the I/O tasks can make progress.

use std::net::SocketAddr;
use std::time::Duration;

use tidelink_transport::{
    ConnectionId, ConnectionState, DisconnectReason, DriverConfig, NetworkDriver,
    NetworkEvent, Pipeline,
};

// =========================================================================
// Helpers
// =========================================================================

fn fast_config() -> DriverConfig {
    DriverConfig {
        connect_timeout: Duration::from_millis(100),
        max_connect_attempts: 3,
        disconnect_timeout: Duration::from_secs(5),
        heartbeat_interval: Duration::from_millis(100),
    }
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Ticks `driver` until `id` produces an event.
async fn next_event(driver: &mut NetworkDriver, id: ConnectionId) -> NetworkEvent {
    for _ in 0..400 {
        driver.update();
        if let Some(event) = driver.pop_event(id) {
            return event;
        }
        tick().await;
    }
    panic!("no event for {id}");
}

/// Starts a server and a client and returns both sides of a live link.
async fn linked_pair() -> (NetworkDriver, ConnectionId, NetworkDriver, ConnectionId) {
    let mut server = NetworkDriver::new(fast_config()).unwrap();
    let addr = server.listen("127.0.0.1:0".parse().unwrap()).unwrap();

    let mut client = NetworkDriver::new(fast_config()).unwrap();
    let client_conn = client.connect(addr);

    let mut server_conn = None;
    for _ in 0..400 {
        server.update();
        if let Some(conn) = server.accept() {
            server_conn = Some(conn);
            break;
        }
        tick().await;
    }
    let server_conn = server_conn.expect("server should accept");

    assert_eq!(next_event(&mut client, client_conn).await, NetworkEvent::Connect);
    assert_eq!(client.connection_state(client_conn), ConnectionState::Connected);
    (server, server_conn, client, client_conn)
}

fn unused_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_to_listener_produces_connect_event() {
    let (server, server_conn, _client, _client_conn) = linked_pair().await;
    assert_eq!(server.connection_state(server_conn), ConnectionState::Connected);
    assert!(server.remote_addr(server_conn).is_some());
}

#[tokio::test]
async fn test_events_invisible_until_update() {
    let (mut server, server_conn, mut client, client_conn) = linked_pair().await;

    client
        .send(Pipeline::ReliableSequenced, client_conn, b"hello")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Data has certainly arrived at the socket, but no update ran yet.
    assert_eq!(server.pop_event(server_conn), None);

    server.update();
    assert_eq!(
        server.pop_event(server_conn),
        Some(NetworkEvent::Data {
            pipeline: Pipeline::ReliableSequenced,
            payload: b"hello".to_vec(),
        })
    );
}

#[tokio::test]
async fn test_reliable_frames_arrive_in_order() {
    let (mut server, server_conn, mut client, client_conn) = linked_pair().await;

    for i in 0u8..20 {
        client.send(Pipeline::ReliableSequenced, client_conn, &[i]).unwrap();
    }

    for i in 0u8..20 {
        let event = next_event(&mut server, server_conn).await;
        assert_eq!(
            event,
            NetworkEvent::Data {
                pipeline: Pipeline::ReliableSequenced,
                payload: vec![i],
            }
        );
    }
}

#[tokio::test]
async fn test_unreliable_pipeline_is_tagged() {
    let (mut server, server_conn, mut client, client_conn) = linked_pair().await;

    server
        .send(Pipeline::UnreliableSequenced, server_conn, &[1, 2, 3])
        .unwrap();

    let event = next_event(&mut client, client_conn).await;
    assert_eq!(
        event,
        NetworkEvent::Data {
            pipeline: Pipeline::UnreliableSequenced,
            payload: vec![1, 2, 3],
        }
    );
}

#[tokio::test]
async fn test_frames_sent_while_connecting_are_flushed() {
    let mut server = NetworkDriver::new(fast_config()).unwrap();
    let addr = server.listen("127.0.0.1:0".parse().unwrap()).unwrap();
    let mut client = NetworkDriver::new(fast_config()).unwrap();

    let client_conn = client.connect(addr);
    client
        .send(Pipeline::ReliableSequenced, client_conn, b"early")
        .unwrap();

    let mut server_conn = None;
    for _ in 0..400 {
        server.update();
        client.update();
        if server_conn.is_none() {
            server_conn = server.accept();
        }
        if server_conn.is_some() {
            break;
        }
        tick().await;
    }
    let server_conn = server_conn.expect("server should accept");

    let event = next_event(&mut server, server_conn).await;
    assert_eq!(
        event,
        NetworkEvent::Data {
            pipeline: Pipeline::ReliableSequenced,
            payload: b"early".to_vec(),
        }
    );
}

#[tokio::test]
async fn test_local_disconnect_reports_closed_by_remote_to_peer() {
    let (mut server, server_conn, mut client, client_conn) = linked_pair().await;

    assert!(client.disconnect(client_conn));
    assert_eq!(client.connection_state(client_conn), ConnectionState::Disconnected);

    let event = next_event(&mut server, server_conn).await;
    assert_eq!(event, NetworkEvent::Disconnect(DisconnectReason::ClosedByRemote));
    // Popping the disconnect released the handle.
    assert_eq!(server.connection_state(server_conn), ConnectionState::Disconnected);
    assert!(server.send(Pipeline::ReliableSequenced, server_conn, b"x").is_err());
}

#[tokio::test]
async fn test_connect_without_listener_exhausts_attempts() {
    let mut client = NetworkDriver::new(fast_config()).unwrap();
    let conn = client.connect(unused_port());

    let event = next_event(&mut client, conn).await;
    assert_eq!(
        event,
        NetworkEvent::Disconnect(DisconnectReason::MaxConnectionAttempts)
    );
    assert_eq!(client.connection_state(conn), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_dropping_driver_closes_peer_links() {
    let (mut server, server_conn, client, _client_conn) = linked_pair().await;

    drop(client);

    let event = next_event(&mut server, server_conn).await;
    assert_eq!(event, NetworkEvent::Disconnect(DisconnectReason::ClosedByRemote));
}

#[tokio::test]
async fn test_disconnect_while_connecting_stops_dialing() {
    let addr = unused_port();
    let mut client = NetworkDriver::new(DriverConfig {
        connect_timeout: Duration::from_millis(50),
        max_connect_attempts: 100,
        ..fast_config()
    })
    .unwrap();
    let conn = client.connect(addr);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(client.disconnect(conn));

    // Anything still dialing would reach this listener within one retry.
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_millis(400), listener.accept()).await;
    assert!(accepted.is_err(), "abandoned handle kept dialing");
}

#[tokio::test]
async fn test_zero_heartbeat_link_still_reports_disconnect() {
    let mut server = NetworkDriver::new(fast_config()).unwrap();
    let addr = server.listen("127.0.0.1:0".parse().unwrap()).unwrap();
    let mut client = NetworkDriver::new(DriverConfig {
        heartbeat_interval: Duration::ZERO,
        ..fast_config()
    })
    .unwrap();
    let client_conn = client.connect(addr);

    let mut server_conn = None;
    for _ in 0..400 {
        server.update();
        if let Some(conn) = server.accept() {
            server_conn = Some(conn);
            break;
        }
        tick().await;
    }
    let server_conn = server_conn.expect("server should accept");
    assert_eq!(next_event(&mut client, client_conn).await, NetworkEvent::Connect);

    server
        .send(Pipeline::ReliableSequenced, server_conn, b"ping")
        .unwrap();
    assert_eq!(
        next_event(&mut client, client_conn).await,
        NetworkEvent::Data {
            pipeline: Pipeline::ReliableSequenced,
            payload: b"ping".to_vec(),
        }
    );

    assert!(server.disconnect(server_conn));
    assert_eq!(
        next_event(&mut client, client_conn).await,
        NetworkEvent::Disconnect(DisconnectReason::ClosedByRemote)
    );
}

#[tokio::test]
async fn test_stop_listening_refuses_new_peers_and_keeps_old_ones() {
    let (mut server, server_conn, mut client, client_conn) = linked_pair().await;
    let addr = server.local_addr().unwrap();

    assert!(server.stop_listening());

    let mut late = NetworkDriver::new(fast_config()).unwrap();
    let late_conn = late.connect(addr);
    assert_eq!(
        next_event(&mut late, late_conn).await,
        NetworkEvent::Disconnect(DisconnectReason::MaxConnectionAttempts)
    );
    server.update();
    assert_eq!(server.accept(), None);

    // The link accepted before stopping still works.
    client
        .send(Pipeline::ReliableSequenced, client_conn, b"still here")
        .unwrap();
    assert_eq!(
        next_event(&mut server, server_conn).await,
        NetworkEvent::Data {
            pipeline: Pipeline::ReliableSequenced,
            payload: b"still here".to_vec(),
        }
    );
}
