//! The server session: accept, claim, route.
//!
//! Every accepted connection moves through
//!
//! ```text
//! accepted ──→ Unclaimed ──(JoinRoom ok)──→ RoomMember ──(Disconnect)──→ removed
//!                  │
//!                  └──(Disconnect / unclaimed timeout)──→ removed
//! ```
//!
//! and is owned by exactly one of the unclaimed pool or a room's member
//! set at any time. All of it happens inside [`ServerSession::tick`].

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tidelink_protocol::{
    Command, ControlRequest, ResultCode, RoomRequestResult, Snapshot, WireRecord,
};
use tidelink_room::{CommandProcessor, Room, RoomBatch, RoomError, RoomId, RoomRegistry};
use tidelink_transport::{
    ConnectionId, ConnectionState, NetworkDriver, NetworkEvent, Pipeline, parse_endpoint,
};

use crate::unclaimed::{UnclaimedConnection, UnclaimedPool};
use crate::{ServerConfig, SessionError};

/// Lifecycle of a [`ServerSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Created,
    Listening,
    Disposed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Listening => write!(f, "Listening"),
            Self::Disposed => write!(f, "Disposed"),
        }
    }
}

/// What happened to an unclaimed connection while draining its events.
enum Claim {
    Pending,
    Joined,
    Gone,
}

/// The server side: a listener, the unclaimed pool and the room registry.
pub struct ServerSession {
    config: ServerConfig,
    driver: NetworkDriver,
    state: ServerState,
    elapsed: Duration,
    unclaimed: UnclaimedPool,
    rooms: RoomRegistry,
}

impl ServerSession {
    /// Creates a session that is not yet listening.
    ///
    /// # Errors
    /// [`SessionError::Transport`] outside a Tokio runtime.
    pub fn new(config: ServerConfig) -> Result<Self, SessionError> {
        let driver = NetworkDriver::new(config.driver.clone())?;
        let rooms = RoomRegistry::new(config.room.clone());
        Ok(Self {
            config,
            driver,
            state: ServerState::Created,
            elapsed: Duration::ZERO,
            unclaimed: UnclaimedPool::default(),
            rooms,
        })
    }

    /// Creates a session listening on `address` (`"ip:port"`, port 0 allowed).
    ///
    /// # Errors
    /// [`SessionError::AddressParse`] or a bind failure.
    pub fn listen(address: &str, config: ServerConfig) -> Result<Self, SessionError> {
        let addr =
            parse_endpoint(address).map_err(|e| SessionError::AddressParse(e.to_string()))?;
        let mut session = Self::new(config)?;
        session.bind(addr)?;
        Ok(session)
    }

    /// Starts listening on `addr` and returns the bound address.
    ///
    /// # Errors
    /// [`SessionError::InvalidState`] unless `Created`, or a bind failure.
    pub fn bind(&mut self, addr: SocketAddr) -> Result<SocketAddr, SessionError> {
        if self.state != ServerState::Created {
            return Err(SessionError::InvalidState(format!(
                "cannot listen while {}",
                self.state
            )));
        }
        let local = self.driver.listen(addr)?;
        self.state = ServerState::Listening;
        tracing::info!(%local, "server session listening");
        Ok(local)
    }

    /// Runs one server frame, advancing the clock by `dt`.
    ///
    /// In order:
    /// 1. advance elapsed time
    /// 2. drop invalid unclaimed entries, evict those older than the timeout
    /// 3. move newly accepted connections into the unclaimed pool
    /// 4. process control requests from unclaimed connections
    /// 5. collect room members' commands into per-room batches
    ///
    /// Batches from the previous tick are cleared first.
    pub fn tick(&mut self, dt: Duration) {
        if self.state == ServerState::Disposed {
            tracing::warn!("tick on a disposed server session ignored");
            return;
        }
        self.rooms.clear_batches();
        self.driver.update();

        self.elapsed += dt;
        self.run_maintenance();
        self.accept_pending();
        self.process_unclaimed();
        self.process_members();
    }

    fn run_maintenance(&mut self) {
        let now = self.elapsed;
        let timeout = self.config.unclaimed_timeout;
        let driver = &mut self.driver;
        self.unclaimed.retain(|entry| {
            let conn = entry.connection;
            if driver.connection_state(conn) == ConnectionState::Disconnected {
                tracing::debug!(%conn, "dropping invalid unclaimed connection");
                return false;
            }
            if entry.age(now) >= timeout {
                tracing::info!(
                    %conn,
                    age_ms = entry.age(now).as_millis() as u64,
                    "unclaimed connection timed out"
                );
                driver.disconnect(conn);
                return false;
            }
            true
        });
    }

    fn accept_pending(&mut self) {
        while let Some(conn) = self.driver.accept() {
            tracing::debug!(%conn, remote = ?self.driver.remote_addr(conn), "connection unclaimed");
            self.unclaimed.insert(conn, self.elapsed);
        }
    }

    fn process_unclaimed(&mut self) {
        for conn in self.unclaimed.connections() {
            match self.drain_unclaimed(conn) {
                Claim::Pending => {}
                Claim::Joined | Claim::Gone => {
                    self.unclaimed.remove(conn);
                }
            }
        }
    }

    fn drain_unclaimed(&mut self, conn: ConnectionId) -> Claim {
        while let Some(event) = self.driver.pop_event(conn) {
            match event {
                NetworkEvent::Connect => tracing::trace!(%conn, "connect event"),
                NetworkEvent::Data {
                    pipeline: Pipeline::ReliableSequenced,
                    payload,
                } => {
                    let (reply, joined) = self.handle_control(conn, &payload);
                    self.reply(conn, &reply);
                    // Later events belong to the member path.
                    if joined {
                        return Claim::Joined;
                    }
                }
                NetworkEvent::Data { .. } => {
                    tracing::trace!(%conn, "ignoring unreliable data from unclaimed connection");
                }
                NetworkEvent::Disconnect(reason) => {
                    tracing::debug!(%conn, %reason, "unclaimed connection disconnected");
                    return Claim::Gone;
                }
            }
        }
        Claim::Pending
    }

    /// Returns the reply and whether `conn` joined a room.
    fn handle_control(&mut self, conn: ConnectionId, payload: &[u8]) -> (RoomRequestResult, bool) {
        let request = match ControlRequest::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%conn, error = %e, "malformed control request");
                return (
                    RoomRequestResult::failure(ResultCode::InvalidRequest, &e.to_string()),
                    false,
                );
            }
        };

        match request {
            ControlRequest::JoinRoom(room_id) => match self.rooms.join(&room_id, conn) {
                Ok(id) => (RoomRequestResult::success(id.as_str()), true),
                Err(e) => {
                    tracing::debug!(%conn, %room_id, error = %e, "join rejected");
                    (RoomRequestResult::failure(result_code(&e), &e.to_string()), false)
                }
            },
            ControlRequest::CreateRoom => match self.rooms.create_room(None) {
                Ok(id) => (RoomRequestResult::success(id.as_str()), false),
                Err(e) => {
                    tracing::warn!(%conn, error = %e, "create room rejected");
                    (RoomRequestResult::failure(result_code(&e), &e.to_string()), false)
                }
            },
        }
    }

    fn reply(&mut self, conn: ConnectionId, result: &RoomRequestResult) {
        let sent = result.to_bytes().map_err(SessionError::from).and_then(|bytes| {
            self.driver
                .send(Pipeline::ReliableSequenced, conn, &bytes)
                .map_err(SessionError::from)
        });
        if let Err(e) = sent {
            tracing::warn!(%conn, error = %e, "failed to send room result");
        }
    }

    fn process_members(&mut self) {
        let members: Vec<ConnectionId> = self
            .rooms
            .iter()
            .flat_map(|room| room.members().iter().copied())
            .collect();

        for conn in members {
            while let Some(event) = self.driver.pop_event(conn) {
                match event {
                    NetworkEvent::Data {
                        pipeline: Pipeline::ReliableSequenced,
                        payload,
                    } => match Command::decode(&payload) {
                        Ok(command) => {
                            self.rooms.push_command(conn, command);
                        }
                        Err(e) => tracing::warn!(%conn, error = %e, "dropping malformed command"),
                    },
                    NetworkEvent::Data { .. } | NetworkEvent::Connect => {}
                    NetworkEvent::Disconnect(reason) => {
                        let room = self.rooms.remove_member(conn);
                        tracing::info!(%conn, %reason, room_id = ?room, "member disconnected");
                        break;
                    }
                }
            }
        }
    }

    /// One batch per room, aligned with registry order. Valid until the
    /// next tick.
    pub fn command_batches(&self) -> impl Iterator<Item = &RoomBatch> {
        self.rooms.batches()
    }

    /// Hands every room's batch to `processor`, in registry order.
    pub fn dispatch(&self, processor: &mut impl CommandProcessor) {
        for batch in self.rooms.batches() {
            processor.process(batch);
        }
    }

    /// Registers an empty room. `None` draws a random id.
    pub fn create_room(&mut self, id: Option<&str>) -> Result<RoomId, SessionError> {
        Ok(self.rooms.create_room(id)?)
    }

    /// Unregisters a room and disconnects its members.
    pub fn remove_room(&mut self, id: &str) -> Result<(), SessionError> {
        let room = self.rooms.remove_room(id)?;
        for &conn in room.members() {
            self.driver.disconnect(conn);
        }
        Ok(())
    }

    /// Sends `snapshot` to one connection on the unreliable pipeline.
    pub fn send_snapshot(
        &mut self,
        conn: ConnectionId,
        snapshot: Snapshot,
    ) -> Result<(), SessionError> {
        let bytes = snapshot.to_bytes()?;
        self.driver.send(Pipeline::UnreliableSequenced, conn, &bytes)?;
        Ok(())
    }

    /// Sends `snapshot` to every member of room `id`.
    ///
    /// Returns how many members it was queued for.
    pub fn broadcast_snapshot(&mut self, id: &str, snapshot: Snapshot) -> Result<usize, SessionError> {
        let room = self
            .rooms
            .get(id)
            .ok_or_else(|| RoomError::NotFound(id.to_string()))?;
        let bytes = snapshot.to_bytes()?;
        let mut sent = 0;
        for &conn in room.members() {
            match self.driver.send(Pipeline::UnreliableSequenced, conn, &bytes) {
                Ok(()) => sent += 1,
                Err(e) => tracing::debug!(%conn, error = %e, "snapshot not sent"),
            }
        }
        Ok(sent)
    }

    /// Stops listening, disconnects every connection and releases all
    /// rooms. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == ServerState::Disposed {
            return;
        }
        self.driver.stop_listening();
        let mut closed = 0usize;
        for entry in self.unclaimed.drain() {
            self.driver.disconnect(entry.connection);
            closed += 1;
        }
        for conn in self.rooms.clear() {
            self.driver.disconnect(conn);
            closed += 1;
        }
        self.state = ServerState::Disposed;
        tracing::info!(closed, "server session disposed");
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The bound listen address, while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.driver.local_addr()
    }

    /// Total time advanced through [`tick`](Self::tick).
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn unclaimed_count(&self) -> usize {
        self.unclaimed.len()
    }

    /// Unclaimed connections in accept order.
    pub fn unclaimed(&self) -> impl Iterator<Item = &UnclaimedConnection> {
        self.unclaimed.iter()
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// The room `conn` belongs to.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.rooms.room_of(conn)
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn result_code(error: &RoomError) -> ResultCode {
    match error {
        RoomError::NotFound(_) => ResultCode::RoomNotFound,
        RoomError::Full(_) => ResultCode::RoomFull,
        RoomError::LimitReached(_) | RoomError::IdsExhausted { .. } => {
            ResultCode::RoomLimitReached
        }
        RoomError::InvalidId(_) | RoomError::AlreadyExists(_) | RoomError::AlreadyMember(..) => {
            ResultCode::InvalidRequest
        }
    }
}
