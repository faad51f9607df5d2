//! Room echo: every tick the server sums the command values each room
//! received so far and broadcasts the total as a snapshot.
//!
//! ```text
//! room-echo server [config.json]
//! room-echo client <ip:port> <room>
//! ```
//!
//! Set `RUST_LOG=debug` for transport and session logs.

use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidelink::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    bind: String,
    tick_rate_hz: u32,
    rooms: Vec<String>,
    server: ServerConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7777".into(),
            tick_rate_hz: 30,
            rooms: vec!["lobby".into()],
            server: ServerConfig::default(),
        }
    }
}

fn load_config(path: Option<&str>) -> Result<DemoConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(DemoConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

async fn run_server(config: DemoConfig) -> Result<(), Box<dyn Error>> {
    let mut host = ServerHost::builder()
        .bind(&config.bind)
        .config(config.server)
        .tick_rate(config.tick_rate_hz)
        .rooms(config.rooms)
        .build()?;
    tracing::info!(addr = ?host.local_addr(), "room-echo server up");

    let mut totals: HashMap<RoomId, u32> = HashMap::new();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            info = host.step() => {
                let session = host.session();
                let updates: Vec<RoomId> = session
                    .command_batches()
                    .filter(|batch| !batch.is_empty())
                    .map(|batch| {
                        let total = totals.entry(batch.room_id().clone()).or_default();
                        for command in batch.commands() {
                            *total = total.wrapping_add(command.value);
                        }
                        batch.room_id().clone()
                    })
                    .collect();

                let sequence = info.tick as u32;
                for room in updates {
                    let value = totals.get(&room).copied().unwrap_or_default();
                    host.session_mut()
                        .broadcast_snapshot(room.as_str(), Snapshot::new(sequence, value))?;
                }
            }
        }
    }

    host.session_mut().shutdown();
    tracing::info!("room-echo server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

const CLIENT_FRAME: Duration = Duration::from_millis(16);

async fn run_client(address: &str, room: &str) -> Result<(), Box<dyn Error>> {
    let mut client = ClientSession::new(ClientConfig::default())?;

    let mut connect = client.connect(address)?;
    let () = tick_until(&mut client, &mut connect).await?;
    tracing::info!(%address, "connected");

    let mut join = client.join_room(room)?;
    let room_id = tick_until(&mut client, &mut join).await?;
    tracing::info!(room = %room_id, "joined");

    let mut sequence = 0u32;
    let mut last_seen = None;
    while client.state() == ClientState::Connected {
        client.tick();
        if sequence % 30 == 0 {
            client.send(Command::new(sequence / 30, sequence % 7 + 1));
        }
        sequence += 1;

        if let Some(snapshot) = client.latest_snapshot() {
            if last_seen != Some(snapshot.sequence) {
                last_seen = Some(snapshot.sequence);
                tracing::info!(tick = snapshot.sequence, total = snapshot.value, "snapshot");
            }
        }
        tokio::time::sleep(CLIENT_FRAME).await;
    }

    tracing::info!(reason = ?client.disconnect_reason(), "disconnected");
    Ok(())
}

async fn tick_until<T>(
    client: &mut ClientSession,
    ticket: &mut tidelink::session::Ticket<T>,
) -> Result<T, SessionError> {
    loop {
        client.tick();
        if let Some(outcome) = ticket.try_result() {
            return outcome;
        }
        tokio::time::sleep(CLIENT_FRAME).await;
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

const USAGE: &str = "usage: room-echo server [config.json] | room-echo client <ip:port> <room>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("server") => run_server(load_config(args.get(1).map(String::as_str))?).await,
        Some("client") => match (args.get(1), args.get(2)) {
            (Some(address), Some(room)) => run_client(address, room).await,
            _ => Err(USAGE.into()),
        },
        _ => Err(USAGE.into()),
    }
}
