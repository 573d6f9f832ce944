//! Hub Connections
//!
//! One live transport session for one authenticated user. The session owns
//! two pumps: the reader runs on the upgrade task and feeds submissions into
//! the hub, the writer runs on its own task and is the only code that ever
//! writes to the transport.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use super::error::{CapacityError, TransportError};
use super::hub::Hub;
use super::messages::{ClientFrame, ServerFrame};
use super::session::{IllegalTransition, SessionState};
use crate::domain::{MessageDraft, UserId};

/// Process-unique connection identifier.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared side of a connection, held by the registry and by both pumps.
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    outbound: mpsc::Sender<ServerFrame>,
    shutdown: watch::Sender<bool>,
    state: Mutex<SessionState>,
}

/// Receiving side of a connection, owned by the writer.
pub struct Outbox {
    frames: mpsc::Receiver<ServerFrame>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionHandle {
    /// Create a connection in the `Connecting` state with a bounded outbound queue.
    pub fn new(user_id: UserId, capacity: usize) -> (Arc<Self>, Outbox) {
        let (outbound, frames) = mpsc::channel(capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            user_id,
            outbound,
            shutdown,
            state: Mutex::new(SessionState::Connecting),
        });
        let outbox = Outbox {
            frames,
            shutdown: shutdown_rx,
        };
        (handle, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Non-blocking enqueue onto the outbound queue.
    pub fn try_enqueue(&self, frame: ServerFrame) -> Result<(), CapacityError> {
        if self.is_closed() {
            return Err(CapacityError::Closed);
        }
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => CapacityError::Full,
            TrySendError::Closed(_) => CapacityError::Closed,
        })
    }

    /// Begin closing. Both pumps stop at their next step and nothing further
    /// is accepted. Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if state.can_transition_to(SessionState::Closing) {
                *state = SessionState::Closing;
            }
        }
        !self.shutdown.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn mark_active(&self) -> Result<(), IllegalTransition> {
        self.state.lock().transition(SessionState::Active)
    }

    pub(crate) fn mark_closed(&self) {
        self.close();
        if let Err(e) = self.state.lock().transition(SessionState::Closed) {
            tracing::debug!(connection_id = self.id, error = %e, "Close transition skipped");
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("state", &self.state())
            .finish()
    }
}

impl Outbox {
    /// Next queued frame, for callers that drain the queue themselves.
    pub async fn recv(&mut self) -> Option<ServerFrame> {
        self.frames.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServerFrame> {
        self.frames.try_recv().ok()
    }
}

/// Drain the outbound queue to the transport until the connection closes.
///
/// Messages sent by this connection's own user are skipped.
pub(crate) async fn write_pump<W>(
    mut sink: W,
    mut outbox: Outbox,
    handle: Arc<ConnectionHandle>,
) -> Result<(), TransportError>
where
    W: Sink<WsMessage> + Unpin,
    W::Error: fmt::Display,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = outbox.shutdown.changed() => break,
            frame = outbox.frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let ServerFrame::MessageCreate(message) = &frame {
            if message.sender_id == handle.user_id() {
                continue;
            }
        }

        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(connection_id = handle.id(), error = %e, "Failed to serialize frame");
                continue;
            }
        };

        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
            handle.close();
            return Err(TransportError::Write(e.to_string()));
        }
    }

    let _ = sink.close().await;
    Ok(())
}

/// Read client frames until the transport ends, goes idle, or the
/// connection is closed from elsewhere.
pub(crate) async fn read_pump<R, E>(
    mut stream: R,
    hub: &Hub,
    handle: &ConnectionHandle,
    idle_timeout: Duration,
) -> Result<(), TransportError>
where
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = handle.closed() => return Ok(()),
            next = tokio::time::timeout(idle_timeout, stream.next()) => next,
        };

        let message = match next {
            Err(_) => return Err(TransportError::IdleTimeout(idle_timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(TransportError::Read(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            WsMessage::Text(text) => {
                let frame: ClientFrame = serde_json::from_str(text.as_str())?;
                handle_frame(frame, hub, handle).await;
            }
            WsMessage::Binary(_) => return Err(TransportError::Protocol("binary frames are not accepted")),
            WsMessage::Close(_) => return Ok(()),
            // Pong is handled by the transport
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
        }
    }
}

async fn handle_frame(frame: ClientFrame, hub: &Hub, handle: &ConnectionHandle) {
    let reply = match frame {
        ClientFrame::Heartbeat => ServerFrame::HeartbeatAck,
        ClientFrame::SendMessage {
            chat_id,
            content,
            nonce,
        } => {
            let draft = MessageDraft::new(chat_id, handle.user_id(), content);
            match hub.submit(draft).await {
                Ok(message) => ServerFrame::MessageAck { nonce, message },
                Err(e) => ServerFrame::error(e.code(), e.to_string(), nonce),
            }
        }
    };

    if let Err(e) = handle.try_enqueue(reply) {
        tracing::debug!(
            connection_id = handle.id(),
            user_id = %handle.user_id(),
            error = %e,
            "Reply not enqueued"
        );
    }
}

/// Run one registered session to completion.
///
/// Spawns the writer, runs the reader on the current task, then unregisters
/// the connection and waits for the writer to finish.
pub async fn run_session<W, R, E>(
    sink: W,
    stream: R,
    hub: Arc<Hub>,
    handle: Arc<ConnectionHandle>,
    outbox: Outbox,
    idle_timeout: Duration,
) where
    W: Sink<WsMessage> + Unpin + Send + 'static,
    W::Error: fmt::Display,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: fmt::Display,
{
    let writer = tokio::spawn(write_pump(sink, outbox, handle.clone()));

    match read_pump(stream, &hub, &handle, idle_timeout).await {
        Ok(()) => tracing::debug!(connection_id = handle.id(), "Reader finished"),
        Err(e) => tracing::debug!(connection_id = handle.id(), error = %e, "Reader stopped"),
    }

    hub.disconnect(&handle);

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(connection_id = handle.id(), error = %e, "Writer stopped"),
        Err(e) => tracing::warn!(connection_id = handle.id(), error = %e, "Writer task failed"),
    }

    handle.mark_closed();
    tracing::info!(
        user_id = %handle.user_id(),
        connection_id = handle.id(),
        "Session closed"
    );
}
