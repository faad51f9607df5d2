//! The client session: one connection, driven once per frame.
//!
//! ```text
//! Idle ──connect()──→ Connecting ──(Connect event)──→ Connected
//!                          │                              │
//!                          └──(Disconnect event)──────────┴──→ Disconnected
//! ```
//!
//! `Disconnected` is terminal; create a new session to reconnect.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;

use tidelink_buffer::SequenceBuffer;
use tidelink_protocol::{Command, ControlRequest, RoomRequestResult, Snapshot, WireRecord};
use tidelink_room::RoomId;
use tidelink_transport::{
    ConnectionId, DisconnectReason, NetworkDriver, NetworkEvent, Pipeline, endpoint,
    parse_endpoint,
};

use crate::ticket::{Resolver, Ticket};
use crate::{ClientConfig, ConnectTicket, RoomTicket, SessionError};

/// Lifecycle of a [`ClientSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// A room request awaiting the server's answer.
struct PendingRoom {
    join: bool,
    resolver: Resolver<RoomId>,
}

/// A single-connection client.
///
/// Owns its driver and snapshot ring buffer. Nothing happens between
/// calls to [`tick`](Self::tick): events, snapshots and ticket
/// resolutions all land during it.
pub struct ClientSession {
    driver: NetworkDriver,
    state: ClientState,
    connection: Option<ConnectionId>,
    pending_connect: Option<Resolver<()>>,
    /// Room requests in send order; the server answers them in order.
    pending_rooms: VecDeque<PendingRoom>,
    room: Option<RoomId>,
    snapshots: SequenceBuffer<Snapshot>,
    disconnect_reason: Option<DisconnectReason>,
}

impl ClientSession {
    /// Creates an idle session.
    ///
    /// # Errors
    /// - [`SessionError::InvalidConfig`] for a zero `snapshot_capacity`
    /// - [`SessionError::Transport`] outside a Tokio runtime
    pub fn new(config: ClientConfig) -> Result<Self, SessionError> {
        let snapshots = SequenceBuffer::new(config.snapshot_capacity).ok_or_else(|| {
            SessionError::InvalidConfig("snapshot_capacity must be non-zero".into())
        })?;
        let driver = NetworkDriver::new(config.driver)?;
        Ok(Self {
            driver,
            state: ClientState::Idle,
            connection: None,
            pending_connect: None,
            pending_rooms: VecDeque::new(),
            room: None,
            snapshots,
            disconnect_reason: None,
        })
    }

    /// Starts connecting to `"ip:port"`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] unless the session is `Idle`
    /// - [`SessionError::AddressParse`] for a malformed address; no
    ///   network attempt is made
    pub fn connect(&mut self, address: &str) -> Result<ConnectTicket, SessionError> {
        self.ensure_idle()?;
        let addr =
            parse_endpoint(address).map_err(|e| SessionError::AddressParse(e.to_string()))?;
        Ok(self.connect_addr(addr))
    }

    /// Starts connecting to `host` (an IP literal) on `port`.
    ///
    /// # Errors
    /// Same as [`connect`](Self::connect).
    pub fn connect_to(&mut self, host: &str, port: u16) -> Result<ConnectTicket, SessionError> {
        self.ensure_idle()?;
        let addr = endpoint(host, port).map_err(|e| SessionError::AddressParse(e.to_string()))?;
        Ok(self.connect_addr(addr))
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.state {
            ClientState::Idle => Ok(()),
            other => Err(SessionError::InvalidState(format!(
                "cannot connect while {other}"
            ))),
        }
    }

    fn connect_addr(&mut self, addr: SocketAddr) -> ConnectTicket {
        let conn = self.driver.connect(addr);
        let (resolver, ticket) = Ticket::new();
        self.connection = Some(conn);
        self.pending_connect = Some(resolver);
        self.state = ClientState::Connecting;
        tracing::info!(%conn, %addr, "client connecting");
        ticket
    }

    /// Polls the driver and drains every pending event.
    ///
    /// - `Connect` resolves the connect ticket.
    /// - Unreliable data is a [`Snapshot`] and goes into the ring buffer.
    /// - Reliable data is a [`RoomRequestResult`] for the oldest room ticket.
    /// - `Disconnect` tears the connection down and fails outstanding tickets.
    pub fn tick(&mut self) {
        self.driver.update();
        let Some(conn) = self.connection else {
            return;
        };

        while let Some(event) = self.driver.pop_event(conn) {
            match event {
                NetworkEvent::Connect => {
                    self.state = ClientState::Connected;
                    tracing::info!(%conn, "client connected");
                    if let Some(resolver) = self.pending_connect.take() {
                        let _ = resolver.send(Ok(()));
                    }
                }
                NetworkEvent::Data {
                    pipeline: Pipeline::UnreliableSequenced,
                    payload,
                } => match Snapshot::decode(&payload) {
                    Ok(snapshot) => {
                        self.snapshots.set(snapshot);
                    }
                    Err(e) => tracing::warn!(%conn, error = %e, "dropping malformed snapshot"),
                },
                NetworkEvent::Data {
                    pipeline: Pipeline::ReliableSequenced,
                    payload,
                } => self.handle_room_result(conn, &payload),
                NetworkEvent::Disconnect(reason) => {
                    tracing::info!(%conn, %reason, "client disconnected");
                    self.connection = None;
                    self.room = None;
                    self.state = ClientState::Disconnected;
                    self.disconnect_reason = Some(reason);
                    if let Some(resolver) = self.pending_connect.take() {
                        let _ = resolver.send(Err(SessionError::ConnectFailed(reason)));
                    }
                    for pending in self.pending_rooms.drain(..) {
                        let _ = pending.resolver.send(Err(SessionError::Disconnected(reason)));
                    }
                    break;
                }
            }
        }
    }

    fn handle_room_result(&mut self, conn: ConnectionId, payload: &[u8]) {
        let result = match RoomRequestResult::decode(payload) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(%conn, error = %e, "dropping malformed room result");
                return;
            }
        };
        let Some(pending) = self.pending_rooms.pop_front() else {
            tracing::warn!(%conn, code = %result.code, "room result with no request outstanding");
            return;
        };

        let outcome = if result.is_success() {
            let room = RoomId::new(result.room_id_or_reason).map_err(SessionError::from);
            if let (true, Ok(id)) = (pending.join, &room) {
                tracing::info!(%conn, room_id = %id, "joined room");
                self.room = Some(id.clone());
            }
            room
        } else {
            Err(SessionError::RoomRejected {
                code: result.code,
                reason: result.room_id_or_reason,
            })
        };
        let _ = pending.resolver.send(outcome);
    }

    /// Sends `command` on the reliable pipeline.
    ///
    /// Fire-and-forget: delivery is the pipeline's job, and a broken link
    /// surfaces as a `Disconnect` on a later tick. Commands sent while
    /// connecting are flushed once the link is up.
    pub fn send(&mut self, command: Command) {
        let Some(conn) = self.connection else {
            tracing::debug!(%command, state = %self.state, "command dropped, no connection");
            return;
        };
        let result = command.to_bytes().map_err(SessionError::from).and_then(|bytes| {
            self.driver
                .send(Pipeline::ReliableSequenced, conn, &bytes)
                .map_err(SessionError::from)
        });
        if let Err(e) = result {
            tracing::debug!(%conn, %command, error = %e, "command not sent");
        }
    }

    /// Asks the server to put this connection into room `room_id`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] without a connection, once in a
    ///   room, or while another join is pending
    /// - a protocol error if `room_id` exceeds the wire limit
    pub fn join_room(&mut self, room_id: &str) -> Result<RoomTicket, SessionError> {
        self.request_room(ControlRequest::JoinRoom(room_id.to_string()))
    }

    /// Asks the server to create an empty room. The ticket yields its id;
    /// the connection is not a member until it joins.
    ///
    /// # Errors
    /// Same states as [`join_room`](Self::join_room).
    pub fn create_room(&mut self) -> Result<RoomTicket, SessionError> {
        self.request_room(ControlRequest::CreateRoom)
    }

    // Members speak only commands; a control request sent after joining
    // would reach the room as one.
    fn request_room(&mut self, request: ControlRequest) -> Result<RoomTicket, SessionError> {
        let conn = self.connection.ok_or_else(|| {
            SessionError::InvalidState(format!("cannot send room request while {}", self.state))
        })?;
        if let Some(room) = &self.room {
            return Err(SessionError::InvalidState(format!(
                "already a member of room '{room}'"
            )));
        }
        if self.pending_rooms.iter().any(|pending| pending.join) {
            return Err(SessionError::InvalidState(
                "a join request is already pending".into(),
            ));
        }

        let join = matches!(request, ControlRequest::JoinRoom(_));
        let bytes = request.to_bytes()?;
        self.driver.send(Pipeline::ReliableSequenced, conn, &bytes)?;
        let (resolver, ticket) = Ticket::new();
        self.pending_rooms.push_back(PendingRoom { join, resolver });
        tracing::debug!(%conn, ?request, "room request sent");
        Ok(ticket)
    }

    /// Closes the connection locally. The session becomes `Disconnected`
    /// and outstanding tickets resolve with [`SessionError::Abandoned`].
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            self.driver.disconnect(conn);
            tracing::info!(%conn, "client closed connection");
        }
        if self.state != ClientState::Idle {
            self.state = ClientState::Disconnected;
        }
        self.room = None;
        self.abandon_pending();
    }

    /// Disconnects and releases the session.
    pub fn close(mut self) {
        self.disconnect();
    }

    fn abandon_pending(&mut self) {
        if let Some(resolver) = self.pending_connect.take() {
            let _ = resolver.send(Err(SessionError::Abandoned));
        }
        for pending in self.pending_rooms.drain(..) {
            let _ = pending.resolver.send(Err(SessionError::Abandoned));
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The active connection handle, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// The room this connection joined, once the server confirmed it.
    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    /// Why the connection was lost, once `Disconnected` by the remote side.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        self.disconnect_reason
    }

    /// The snapshot for `sequence`, if it is still buffered.
    pub fn snapshot(&self, sequence: u32) -> Option<&Snapshot> {
        self.snapshots.get(sequence)
    }

    /// The snapshot ring buffer.
    pub fn snapshots(&self) -> &SequenceBuffer<Snapshot> {
        &self.snapshots
    }

    /// The newest buffered snapshot.
    pub fn latest_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.latest_value()
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
