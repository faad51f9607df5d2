//! `ServerHost` builder and tick loop.
//!
//! Ties a [`ServerSession`] to a [`TickScheduler`] so a server can run
//! as a single task: wait for the tick, run the session frame, hand the
//! command batches to the processing stage.

use std::future::Future;
use std::net::SocketAddr;

use tidelink_room::CommandProcessor;
use tidelink_session::{ServerConfig, ServerSession};
use tidelink_tick::{TickConfig, TickInfo, TickScheduler};

use crate::TidelinkError;

/// Builder for a [`ServerHost`].
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), tidelink::TidelinkError> {
/// use tidelink::prelude::*;
///
/// let host = ServerHost::builder()
///     .bind("0.0.0.0:7777")
///     .tick_rate(30)
///     .rooms(["lobby"])
///     .build()?;
/// let processor = |batch: &RoomBatch| {
///     for command in batch.commands() {
///         println!("{}: {command}", batch.room_id());
///     }
/// };
/// host.run(processor, async { let _ = tokio::signal::ctrl_c().await; }).await;
/// # Ok(())
/// # }
/// ```
pub struct ServerHostBuilder {
    bind_addr: String,
    config: ServerConfig,
    tick: TickConfig,
    rooms: Vec<String>,
}

impl ServerHostBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            config: ServerConfig::default(),
            tick: TickConfig::default(),
            rooms: Vec::new(),
        }
    }

    /// Address to listen on, as `ip:port`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Session configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Ticks per second (clamped to 1..=128).
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.tick.tick_rate_hz = hz;
        self
    }

    /// Full tick scheduler configuration.
    pub fn tick_config(mut self, tick: TickConfig) -> Self {
        self.tick = tick;
        self
    }

    /// Rooms to create before the first tick.
    pub fn rooms<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rooms.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Binds the listener and creates the configured rooms.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Result<ServerHost, TidelinkError> {
        let mut session = ServerSession::listen(&self.bind_addr, self.config)?;
        for id in &self.rooms {
            session.create_room(Some(id))?;
        }
        Ok(ServerHost {
            session,
            scheduler: TickScheduler::new(self.tick),
        })
    }
}

impl Default for ServerHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A listening server session with its tick clock.
pub struct ServerHost {
    session: ServerSession,
    scheduler: TickScheduler,
}

impl ServerHost {
    pub fn builder() -> ServerHostBuilder {
        ServerHostBuilder::new()
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.local_addr()
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    /// Mutable access for host-side work between ticks (snapshots, rooms).
    pub fn session_mut(&mut self) -> &mut ServerSession {
        &mut self.session
    }

    /// Waits for the next tick and runs one session frame.
    ///
    /// Batches are left in the session for the caller to read.
    pub async fn step(&mut self) -> TickInfo {
        let info = self.scheduler.wait_for_tick().await;
        self.session.tick(info.dt);
        info
    }

    /// Runs `wait_for_tick → tick(dt) → dispatch` until `shutdown`
    /// completes, then shuts the session down.
    ///
    /// Returns the processor so callers can inspect what it gathered.
    pub async fn run<P, F>(mut self, mut processor: P, shutdown: F) -> P
    where
        P: CommandProcessor,
        F: Future<Output = ()>,
    {
        tracing::info!(
            addr = ?self.session.local_addr(),
            rate_hz = self.scheduler.tick_rate_hz(),
            rooms = self.session.rooms().len(),
            "server host running"
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.step() => self.session.dispatch(&mut processor),
            }
        }

        self.session.shutdown();
        tracing::info!(ticks = self.scheduler.tick_count(), "server host stopped");
        processor
    }
}
