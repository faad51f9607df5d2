//! The tick-polled network driver.
//!
//! Socket I/O runs on Tokio tasks (see the `websocket` module). Those
//! tasks never touch driver state directly: they post [`Signal`]s into a
//! channel, and [`NetworkDriver::update`] drains that channel once per
//! tick. Until `update` runs, nothing new is visible to the caller.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::websocket;
use crate::{
    ConnectionId, ConnectionState, DisconnectReason, DriverConfig, NetworkEvent,
    Pipeline, TransportError,
};

/// What an I/O task reports back to the driver.
pub(crate) enum Signal {
    /// A listener finished the handshake with a new peer.
    Accepted {
        id: ConnectionId,
        remote: SocketAddr,
        outbound: mpsc::UnboundedSender<Outbound>,
    },
    /// An outgoing connection is up.
    Connected(ConnectionId),
    /// A frame passed the header checks and sequencing.
    Data {
        id: ConnectionId,
        pipeline: Pipeline,
        payload: Vec<u8>,
    },
    /// The link is gone.
    Disconnected {
        id: ConnectionId,
        reason: DisconnectReason,
    },
}

/// What the driver asks an I/O task to do.
#[derive(Debug)]
pub(crate) enum Outbound {
    Frame(Vec<u8>),
    Close,
}

/// Driver-side record of one connection.
struct Link {
    state: ConnectionState,
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: VecDeque<NetworkEvent>,
    /// Next outgoing sequence, one counter per pipeline.
    send_sequence: [u16; 2],
}

impl Link {
    fn new(
        state: ConnectionState,
        remote: SocketAddr,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self {
            state,
            remote,
            outbound,
            events: VecDeque::new(),
            send_sequence: [0; 2],
        }
    }

    fn next_sequence(&mut self, pipeline: Pipeline) -> u16 {
        let slot = &mut self.send_sequence[pipeline.index()];
        let current = *slot;
        *slot = slot.wrapping_add(1);
        current
    }
}

struct Listener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

/// Non-blocking driver owning every connection of one endpoint.
///
/// One driver serves either side: a client calls [`connect`](Self::connect),
/// a server calls [`listen`](Self::listen) and [`accept`](Self::accept).
///
/// ## Per-tick usage
///
/// ```text
/// driver.update();
/// while let Some(conn) = driver.accept() { ... }
/// while let Some(event) = driver.pop_event(conn) { ... }
/// driver.send(Pipeline::ReliableSequenced, conn, &bytes)?;
/// ```
pub struct NetworkDriver {
    config: DriverConfig,
    runtime: Handle,
    links: HashMap<ConnectionId, Link>,
    accepted: VecDeque<ConnectionId>,
    signal_tx: mpsc::UnboundedSender<Signal>,
    signal_rx: mpsc::UnboundedReceiver<Signal>,
    listener: Option<Listener>,
}

impl NetworkDriver {
    /// Creates a driver. Must be called from within a Tokio runtime.
    ///
    /// Zero timers in `config` are raised to [`MIN_TIMER`](crate::MIN_TIMER).
    ///
    /// # Errors
    /// Returns [`TransportError::NoRuntime`] outside a runtime.
    pub fn new(config: DriverConfig) -> Result<Self, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let validated = config.validated();
        if validated != config {
            tracing::warn!(?config, "driver config adjusted to non-zero timers");
        }
        let config = validated;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            runtime,
            links: HashMap::new(),
            accepted: VecDeque::new(),
            signal_tx,
            signal_rx,
            listener: None,
        })
    }

    /// The configuration this driver was created with.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Binds `addr` and starts accepting connections.
    ///
    /// Binding happens synchronously, so the returned address is usable
    /// immediately (pass port 0 to let the OS pick one).
    ///
    /// # Errors
    /// [`TransportError::AlreadyListening`] on a second call,
    /// [`TransportError::BindFailed`] if the socket cannot be bound.
    pub fn listen(&mut self, addr: SocketAddr) -> Result<SocketAddr, TransportError> {
        if self.listener.is_some() {
            return Err(TransportError::AlreadyListening);
        }

        let std_listener =
            std::net::TcpListener::bind(addr).map_err(TransportError::BindFailed)?;
        std_listener
            .set_nonblocking(true)
            .map_err(TransportError::BindFailed)?;
        let local_addr = std_listener
            .local_addr()
            .map_err(TransportError::BindFailed)?;

        let listener = {
            let _enter = self.runtime.enter();
            tokio::net::TcpListener::from_std(std_listener)
                .map_err(TransportError::BindFailed)?
        };

        let task = self.runtime.spawn(websocket::accept_loop(
            listener,
            self.signal_tx.clone(),
            self.config.clone(),
        ));
        self.listener = Some(Listener { local_addr, task });

        tracing::info!(%local_addr, "driver listening");
        Ok(local_addr)
    }

    /// Stops accepting and closes the listen socket.
    ///
    /// Handshakes still in flight are abandoned, and peers accepted but
    /// not yet taken through [`accept`](Self::accept) are closed.
    /// Connections already handed out stay open. Returns `false` if the
    /// driver was not listening.
    pub fn stop_listening(&mut self) -> bool {
        let Some(listener) = self.listener.take() else {
            return false;
        };
        listener.task.abort();
        self.update();
        let mut dropped = 0usize;
        while let Some(id) = self.accepted.pop_front() {
            if self.disconnect(id) {
                dropped += 1;
            }
        }
        tracing::info!(local_addr = %listener.local_addr, dropped, "driver stopped listening");
        true
    }

    /// Whether [`listen`](Self::listen) succeeded on this driver.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// The bound listen address, if listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|l| l.local_addr)
    }

    /// Starts connecting to `addr` and returns the pending handle.
    ///
    /// The handle is `Connecting` until a later [`update`](Self::update)
    /// surfaces either a `Connect` event or a `Disconnect` event with
    /// [`DisconnectReason::MaxConnectionAttempts`]. Frames sent while
    /// connecting are queued and flushed once the link is up.
    pub fn connect(&mut self, addr: SocketAddr) -> ConnectionId {
        let id = ConnectionId::next();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.links.insert(
            id,
            Link::new(ConnectionState::Connecting, addr, outbound_tx),
        );
        self.runtime.spawn(websocket::connect_link(
            id,
            addr,
            outbound_rx,
            self.signal_tx.clone(),
            self.config.clone(),
        ));
        tracing::debug!(%id, %addr, "connecting");
        id
    }

    /// The per-tick poll step.
    ///
    /// Moves everything the I/O tasks reported since the last call into
    /// the accept queue and the per-connection event queues.
    pub fn update(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                Signal::Accepted {
                    id,
                    remote,
                    outbound,
                } => {
                    if self.listener.is_none() {
                        tracing::debug!(%id, %remote, "closing peer accepted after listening stopped");
                        let _ = outbound.send(Outbound::Close);
                        continue;
                    }
                    self.links.insert(
                        id,
                        Link::new(ConnectionState::Connected, remote, outbound),
                    );
                    self.accepted.push_back(id);
                }
                Signal::Connected(id) => {
                    if let Some(link) = self.links.get_mut(&id) {
                        link.state = ConnectionState::Connected;
                        link.events.push_back(NetworkEvent::Connect);
                    }
                }
                Signal::Data {
                    id,
                    pipeline,
                    payload,
                } => {
                    if let Some(link) = self.links.get_mut(&id) {
                        link.events
                            .push_back(NetworkEvent::Data { pipeline, payload });
                    }
                }
                Signal::Disconnected { id, reason } => {
                    if let Some(link) = self.links.get_mut(&id) {
                        link.events.push_back(NetworkEvent::Disconnect(reason));
                    }
                }
            }
        }
    }

    /// Pops one connection accepted during the last [`update`](Self::update).
    pub fn accept(&mut self) -> Option<ConnectionId> {
        while let Some(id) = self.accepted.pop_front() {
            if self.links.contains_key(&id) {
                tracing::debug!(%id, "accepted connection");
                return Some(id);
            }
        }
        None
    }

    /// Pops the next queued event for `id`.
    ///
    /// Popping a `Disconnect` releases the handle: afterwards
    /// [`connection_state`](Self::connection_state) reports
    /// `Disconnected` and sends fail.
    pub fn pop_event(&mut self, id: ConnectionId) -> Option<NetworkEvent> {
        let link = self.links.get_mut(&id)?;
        let event = link.events.pop_front()?;
        if let NetworkEvent::Disconnect(reason) = &event {
            tracing::debug!(%id, %reason, "connection released");
            self.links.remove(&id);
        }
        Some(event)
    }

    /// Queues `payload` on `pipeline` for `id`.
    ///
    /// # Errors
    /// - [`TransportError::UnknownConnection`] for an invalid handle
    /// - [`TransportError::PayloadTooLarge`] past [`MAX_PAYLOAD_SIZE`]
    /// - [`TransportError::ConnectionClosed`] if the I/O task is gone
    pub fn send(
        &mut self,
        pipeline: Pipeline,
        id: ConnectionId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        let link = self
            .links
            .get_mut(&id)
            .ok_or(TransportError::UnknownConnection(id))?;
        let sequence = link.next_sequence(pipeline);
        let frame = FrameHeader { pipeline, sequence }.frame(payload);
        link.outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::ConnectionClosed(id))
    }

    /// Closes `id` from this side.
    ///
    /// The handle is invalid immediately and no local event follows; the
    /// peer sees `Disconnect(ClosedByRemote)`. Returns `false` if the
    /// handle was already invalid.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        match self.links.remove(&id) {
            Some(link) => {
                let _ = link.outbound.send(Outbound::Close);
                tracing::debug!(%id, "disconnected locally");
                true
            }
            None => false,
        }
    }

    /// Current state of `id`. Unknown handles are `Disconnected`.
    pub fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        self.links
            .get(&id)
            .map_or(ConnectionState::Disconnected, |link| link.state)
    }

    /// The peer address of `id`, if the handle is valid.
    pub fn remote_addr(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.links.get(&id).map(|link| link.remote)
    }

    /// Number of valid handles.
    pub fn connection_count(&self) -> usize {
        self.links.len()
    }
}

impl Drop for NetworkDriver {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.task.abort();
        }
        for (_, link) in self.links.drain() {
            let _ = link.outbound.send(Outbound::Close);
        }
    }
}
