//! WebSocket I/O tasks using `tokio-tungstenite`.
//!
//! Each connection is served by one task running [`run_link`]. Frames
//! travel as binary WebSocket messages; the stream underneath is TCP, so
//! the reliable pipeline gets ordering and delivery for free and the
//! unreliable pipeline only needs the receive-side sequence filter.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::driver::{Outbound, Signal};
use crate::frame::{FrameHeader, SequenceFilter};
use crate::{ConnectionId, DisconnectReason, DriverConfig, Pipeline, TransportError};

/// Accepts TCP connections, upgrades them and spawns a link task each.
///
/// Handshakes run in a [`JoinSet`] owned by this loop, so aborting the
/// loop also abandons every half-open peer. Established links are
/// detached and stay under the driver's control.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    signals: mpsc::UnboundedSender<Signal>,
    config: DriverConfig,
) {
    let mut handshakes = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "tcp accept failed");
                        time::sleep(Duration::from_millis(10)).await;
                        continue;
                    }
                };
                if signals.is_closed() {
                    return;
                }
                handshakes.spawn(handshake(stream, remote, config.connect_timeout));
            }

            Some(done) = handshakes.join_next() => {
                let Ok(Some((ws, remote))) = done else {
                    continue;
                };
                let id = ConnectionId::next();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                if signals
                    .send(Signal::Accepted {
                        id,
                        remote,
                        outbound: outbound_tx,
                    })
                    .is_err()
                {
                    return;
                }
                tracing::debug!(%id, %remote, "peer handshake complete");
                tokio::spawn(run_link(
                    id,
                    ws,
                    outbound_rx,
                    signals.clone(),
                    config.clone(),
                    Vec::new(),
                ));
            }
        }
    }
}

async fn handshake(
    stream: TcpStream,
    remote: SocketAddr,
    timeout: Duration,
) -> Option<(WebSocketStream<TcpStream>, SocketAddr)> {
    let _ = stream.set_nodelay(true);
    match time::timeout(timeout, tokio_tungstenite::accept_async(stream)).await {
        Ok(Ok(ws)) => Some((ws, remote)),
        Ok(Err(e)) => {
            tracing::debug!(%remote, error = %e, "websocket upgrade failed");
            None
        }
        Err(_) => {
            tracing::debug!(%remote, "websocket upgrade timed out");
            None
        }
    }
}

/// Dials `addr` until it succeeds or the attempts run out, then serves
/// the link.
///
/// Frames the driver queues meanwhile are held and flushed once the link
/// is up. A close from the driver ends the task between or during
/// attempts.
pub(crate) async fn connect_link(
    id: ConnectionId,
    addr: SocketAddr,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    signals: mpsc::UnboundedSender<Signal>,
    config: DriverConfig,
) {
    let mut queued = Vec::new();
    let mut attempt = 0u32;
    let ws = loop {
        attempt += 1;
        let started = Instant::now();
        let dial = time::timeout(config.connect_timeout, open(addr));
        let Some(result) = watch_outbound(dial, &mut outbound, &mut queued).await else {
            tracing::debug!(%id, %addr, attempt, "connect abandoned");
            return;
        };
        match result {
            Ok(Ok(ws)) => break ws,
            Ok(Err(e)) => {
                tracing::debug!(%id, %addr, attempt, error = %e, "connect attempt failed");
            }
            Err(_) => {
                tracing::debug!(%id, %addr, attempt, "connect attempt timed out");
            }
        }

        if attempt >= config.max_connect_attempts {
            tracing::info!(%id, %addr, attempt, "giving up on connection");
            let _ = signals.send(Signal::Disconnected {
                id,
                reason: DisconnectReason::MaxConnectionAttempts,
            });
            return;
        }
        if signals.is_closed() {
            return;
        }
        let backoff = time::sleep_until(started + config.connect_timeout);
        if watch_outbound(backoff, &mut outbound, &mut queued).await.is_none() {
            tracing::debug!(%id, %addr, attempt, "connect abandoned");
            return;
        }
    };

    if signals.send(Signal::Connected(id)).is_err() {
        return;
    }
    tracing::debug!(%id, %addr, attempt, "connected");
    run_link(id, ws, outbound, signals, config, queued).await;
}

/// Drives `work` while draining `outbound` into `queued`.
///
/// Returns `None` as soon as the driver closes the handle.
async fn watch_outbound<F: Future>(
    work: F,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    queued: &mut Vec<Vec<u8>>,
) -> Option<F::Output> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Some(output),
            out = outbound.recv() => match out {
                Some(Outbound::Frame(frame)) => queued.push(frame),
                Some(Outbound::Close) | None => return None,
            },
        }
    }
}

async fn open(addr: SocketAddr) -> Result<WebSocketStream<TcpStream>, TransportError> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(TransportError::ConnectFailed)?;
    let _ = stream.set_nodelay(true);
    let url = format!("ws://{addr}/");
    let (ws, _response) = tokio_tungstenite::client_async(url, stream)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    Ok(ws)
}

/// Pumps one established link until either side ends it.
///
/// `queued` frames go out first. A local close ([`Outbound::Close`] or
/// the driver dropping its sender) ends the task without a signal;
/// anything else reports a [`Signal::Disconnected`] with the matching
/// reason.
pub(crate) async fn run_link<S>(
    id: ConnectionId,
    ws: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    signals: mpsc::UnboundedSender<Signal>,
    config: DriverConfig,
    queued: Vec<Vec<u8>>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let mut filter = SequenceFilter::default();

    if let Err(e) = flush_queued(&mut sink, queued).await {
        tracing::debug!(%id, error = %e, "flushing queued frames failed");
        let _ = signals.send(Signal::Disconnected {
            id,
            reason: DisconnectReason::Default,
        });
        return;
    }

    let mut heartbeat = time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let idle = time::sleep(config.disconnect_timeout);
    tokio::pin!(idle);

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Binary(frame.into())).await {
                        tracing::debug!(%id, error = %e, "send failed");
                        break Some(DisconnectReason::Default);
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    break None;
                }
            },

            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break Some(DisconnectReason::Default);
                }
            }

            () = &mut idle => break Some(DisconnectReason::Timeout),

            msg = stream.next() => {
                idle.as_mut().reset(Instant::now() + config.disconnect_timeout);
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        deliver(id, &data, &mut filter, &signals);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break Some(DisconnectReason::ClosedByRemote);
                    }
                    Some(Ok(_)) => {} // ping, pong, text
                    Some(Err(
                        tungstenite::Error::ConnectionClosed
                        | tungstenite::Error::AlreadyClosed,
                    )) => break Some(DisconnectReason::ClosedByRemote),
                    Some(Err(e)) => {
                        tracing::debug!(%id, error = %e, "receive failed");
                        break Some(DisconnectReason::Default);
                    }
                }
            }
        }
    };

    if let Some(reason) = reason {
        tracing::debug!(%id, %reason, "link lost");
        let _ = signals.send(Signal::Disconnected { id, reason });
    }
}

async fn flush_queued<K>(sink: &mut K, queued: Vec<Vec<u8>>) -> Result<(), tungstenite::Error>
where
    K: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    if queued.is_empty() {
        return Ok(());
    }
    for frame in queued {
        sink.feed(Message::Binary(frame.into())).await?;
    }
    sink.flush().await
}

fn deliver(
    id: ConnectionId,
    frame: &[u8],
    filter: &mut SequenceFilter,
    signals: &mpsc::UnboundedSender<Signal>,
) {
    let (header, payload) = match FrameHeader::split(frame) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::warn!(%id, error = %e, "dropping frame");
            return;
        }
    };
    if header.pipeline == Pipeline::UnreliableSequenced && !filter.accept(header.sequence) {
        tracing::trace!(%id, sequence = header.sequence, "dropping stale frame");
        return;
    }
    let _ = signals.send(Signal::Data {
        id,
        pipeline: header.pipeline,
        payload: payload.to_vec(),
    });
}
