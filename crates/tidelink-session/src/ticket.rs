//! Tickets: the cross-tick results of client operations.
//!
//! A ticket is resolved by a later `ClientSession::tick`, never by the
//! call that created it. It can be awaited (while another task keeps
//! ticking) or polled with [`Ticket::try_result`] from the tick loop.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tidelink_room::RoomId;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::SessionError;

pub(crate) type Resolver<T> = oneshot::Sender<Result<T, SessionError>>;

/// The pending outcome of a session operation.
#[derive(Debug)]
#[must_use = "a ticket reports whether the operation succeeded"]
pub struct Ticket<T> {
    rx: oneshot::Receiver<Result<T, SessionError>>,
    taken: bool,
}

/// Resolves once the connection is up, or fails with the disconnect reason.
pub type ConnectTicket = Ticket<()>;

/// Resolves with the room id once the server answers a room request.
pub type RoomTicket = Ticket<RoomId>;

impl<T> Ticket<T> {
    pub(crate) fn new() -> (Resolver<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx, taken: false })
    }

    /// Non-blocking check.
    ///
    /// Returns `None` while pending. The outcome is handed out once;
    /// later calls return `None` again.
    pub fn try_result(&mut self) -> Option<Result<T, SessionError>> {
        if self.taken {
            return None;
        }
        let outcome = match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(SessionError::Abandoned),
        };
        self.taken = true;
        Some(outcome)
    }

    /// `true` once the outcome has been taken by [`try_result`](Self::try_result).
    pub fn is_taken(&self) -> bool {
        self.taken
    }
}

impl<T> Future for Ticket<T> {
    type Output = Result<T, SessionError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.taken {
            return Poll::Ready(Err(SessionError::InvalidState(
                "ticket outcome already taken".into(),
            )));
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(outcome) => {
                self.taken = true;
                Poll::Ready(outcome.unwrap_or(Err(SessionError::Abandoned)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
