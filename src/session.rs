//! One session per connected socket.
//!
//! The socket is split on accept: a writer task owns the sink and drains
//! an unbounded channel, so handlers and fan-outs from other sessions
//! never block on a slow consumer. The read loop parses each text frame,
//! gates it on the session's authentication state, and dispatches it.
//! The authoritative identity lives here, not in the registry.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::handlers;
use crate::protocol::ClientFrame;
use crate::registry::ClientSender;
use crate::state::SharedState;
use crate::store::AccountStore;

/// Server-side state of one connection:
/// `Unauthenticated → Authenticated(phone) → Closed`.
pub struct Session {
    state: SharedState,
    tx: ClientSender,
    phone: Option<i64>,
}

/// Drive one accepted WebSocket until it closes.
pub async fn run(socket: WebSocket, state: SharedState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut session = Session {
        state,
        tx: tx.clone(),
        phone: None,
    };

    while let Some(received) = stream.next().await {
        match received {
            Ok(Message::Text(text)) => session.handle_frame(&text).await,
            Ok(Message::Ping(payload)) => {
                let _ = tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(%err, "socket receive error");
                break;
            }
        }
    }

    session.on_disconnect().await;
    writer.abort();
}

impl Session {
    pub(crate) fn state(&self) -> &SharedState {
        &self.state
    }

    pub(crate) fn identity(&self) -> Option<i64> {
        self.phone
    }

    pub(crate) fn set_identity(&mut self, phone: i64) {
        self.phone = Some(phone);
    }

    pub(crate) fn clear_identity(&mut self) {
        self.phone = None;
    }

    /// A clone of the writer channel, for the registry.
    pub(crate) fn sender(&self) -> ClientSender {
        self.tx.clone()
    }

    /// Queue one frame for this socket. A send to a closing socket is
    /// silently absorbed; the read loop is already on its way out.
    pub(crate) fn send(&self, frame: &Value) {
        let _ = self.tx.send(Message::Text(frame.to_string()));
    }

    async fn handle_frame(&mut self, text: &str) {
        let frame: ClientFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping unparseable frame");
                return;
            }
        };

        if self.phone.is_none() && !frame.allowed_unauthenticated() {
            warn!(
                kind = frame.kind(),
                "dropping frame from unauthenticated socket"
            );
            return;
        }

        handlers::dispatch(self, frame).await;
    }

    /// Closed state: leave the registry, mark the account offline, tell
    /// online contacts.
    async fn on_disconnect(&mut self) {
        let Some(phone) = self.phone.take() else {
            return;
        };

        self.state.registry.remove(phone).await;

        if let Err(err) = self.state.store.set_status(phone, false).await {
            error!(phone, %err, "failed to mark account offline");
        }

        let frame = json!({"type": "client_disconnected", "phone_number": phone});
        handlers::broadcast_to_contacts(&self.state, phone, &frame).await;

        info!(phone, "client disconnected");
    }
}
