//! STOMP-over-WebSocket transport.
//!
//! [`StompTransport`] owns a background session loop that connects,
//! performs the STOMP handshake, runs the read/write/heart-beat pumps and
//! reconnects after a fixed delay. Subscriptions are scoped to one session;
//! when the socket drops they are forgotten and the owner is expected to
//! re-subscribe from its `on_connect` callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use eadms_protocol::constants::{JSON_CONTENT_TYPE, headers};
use eadms_protocol::{Command, Frame, FrameError};

use crate::lock;
use crate::transport::{
    Connector, RawCallback, SubscriptionHandle, Transport, TransportCallbacks, TransportError,
};
use crate::types::{ProtocolError, TransportConfig};

/// Errors from a single connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum StompError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] tungstenite::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("connection closed")]
    Closed,

    #[error("handshake rejected: {0}")]
    Rejected(ProtocolError),

    #[error("unexpected {0} frame")]
    UnexpectedFrame(Command),
}

/// Connector producing [`StompTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct StompConnector;

impl Connector for StompConnector {
    fn activate(
        &self,
        config: TransportConfig,
        callbacks: TransportCallbacks,
    ) -> Box<dyn Transport> {
        Box::new(StompTransport::activate(config, callbacks))
    }
}

/// Write side of the session currently established, if any.
#[derive(Clone)]
pub(crate) struct LiveSession {
    pub(crate) id: u64,
    write_tx: mpsc::Sender<tungstenite::Message>,
}

impl LiveSession {
    fn send(&self, frame: &Frame) -> Result<(), TransportError> {
        self.write_tx
            .try_send(tungstenite::Message::text(frame.encode()))
            .map_err(|e| match e {
                TrySendError::Full(_) => TransportError::QueueFull,
                TrySendError::Closed(_) => TransportError::NotConnected,
            })
    }
}

struct ActiveSubscription {
    destination: String,
    on_message: RawCallback,
}

/// State shared between the transport handle and its session tasks.
#[derive(Default)]
pub(crate) struct Shared {
    session: Mutex<Option<LiveSession>>,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    next_id: AtomicU64,
    next_session: AtomicU64,
}

impl Shared {
    pub(crate) fn live(&self) -> Option<LiveSession> {
        lock(&self.session).clone()
    }

    /// Publishes the write side of a freshly established session.
    pub(crate) fn begin_session(&self, write_tx: mpsc::Sender<tungstenite::Message>) -> u64 {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.subscriptions).clear();
        *lock(&self.session) = Some(LiveSession { id, write_tx });
        id
    }

    /// Forgets the session and every subscription made on it.
    pub(crate) fn end_session(&self) {
        lock(&self.session).take();
        let dropped = {
            let mut subscriptions = lock(&self.subscriptions);
            let n = subscriptions.len();
            subscriptions.clear();
            n
        };
        if dropped > 0 {
            debug!(dropped, "session ended with active subscriptions");
        }
    }

    pub(crate) fn register(&self, id: String, destination: &str, on_message: RawCallback) {
        lock(&self.subscriptions).insert(
            id,
            ActiveSubscription {
                destination: destination.to_string(),
                on_message,
            },
        );
    }

    /// Returns `true` if the subscription was still registered.
    pub(crate) fn release(&self, id: &str) -> bool {
        lock(&self.subscriptions).remove(id).is_some()
    }

    /// Routes a `MESSAGE` frame to its subscription callback.
    pub(crate) fn dispatch(&self, frame: &Frame) {
        let Some(id) = frame.header(headers::SUBSCRIPTION) else {
            warn!("MESSAGE without subscription header, dropping");
            return;
        };
        let target = lock(&self.subscriptions)
            .get(id)
            .map(|s| (s.destination.clone(), s.on_message.clone()));
        match target {
            Some((destination, on_message)) => {
                trace!(subscription = id, destination = %destination, "dispatching message");
                on_message(&frame.body);
            }
            None => debug!(
                subscription = id,
                destination = ?frame.header(headers::DESTINATION),
                "message for unknown subscription"
            ),
        }
    }

    fn next_subscription_id(&self) -> String {
        format!("sub-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// A STOMP broker connection with automatic reconnection.
pub struct StompTransport {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _session_handle: JoinHandle<()>,
}

impl StompTransport {
    /// Starts the session loop. Must be called within a Tokio runtime.
    pub fn activate(config: TransportConfig, callbacks: TransportCallbacks) -> Self {
        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();

        info!(url = %config.url, "activating STOMP transport");
        let session_handle = tokio::spawn(crate::reconnection::session_loop(
            config,
            callbacks,
            shared.clone(),
            cancel.clone(),
        ));

        Self {
            shared,
            cancel,
            _session_handle: session_handle,
        }
    }

    /// Returns `true` while a STOMP session is established.
    pub fn is_live(&self) -> bool {
        self.shared.live().is_some()
    }

    fn live_session(&self) -> Result<LiveSession, TransportError> {
        if self.cancel.is_cancelled() {
            return Err(TransportError::Deactivated);
        }
        self.shared.live().ok_or(TransportError::NotConnected)
    }
}

impl Transport for StompTransport {
    fn subscribe(
        &self,
        destination: &str,
        on_message: RawCallback,
    ) -> Result<Box<dyn SubscriptionHandle>, TransportError> {
        let session = self.live_session()?;
        let id = self.shared.next_subscription_id();

        // Register before the broker can deliver anything for this id.
        self.shared.register(id.clone(), destination, on_message);
        let frame = Frame::new(Command::Subscribe)
            .with_header(headers::ID, &id)
            .with_header(headers::DESTINATION, destination);
        if let Err(e) = session.send(&frame) {
            self.shared.release(&id);
            return Err(e);
        }

        debug!(id = %id, destination, "subscribed");
        Ok(Box::new(StompSubscription {
            id,
            session: session.id,
            shared: Arc::downgrade(&self.shared),
        }))
    }

    fn publish(&self, destination: &str, body: String) -> Result<(), TransportError> {
        let session = self.live_session()?;
        let frame = Frame::new(Command::Send)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .with_body(body);
        session.send(&frame)?;
        trace!(destination, "published");
        Ok(())
    }

    fn deactivate(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(session) = self.shared.live() {
            let receipt = format!("disconnect-{}", uuid::Uuid::new_v4());
            let frame = Frame::new(Command::Disconnect).with_header(headers::RECEIPT, receipt);
            if let Err(e) = session.send(&frame) {
                debug!(error = %e, "could not queue DISCONNECT");
            }
        }
        self.cancel.cancel();
        info!("STOMP transport deactivated");
    }
}

impl Drop for StompTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to one broker subscription.
struct StompSubscription {
    id: String,
    session: u64,
    shared: Weak<Shared>,
}

impl SubscriptionHandle for StompSubscription {
    fn unsubscribe(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if !shared.release(&self.id) {
            trace!(id = %self.id, "subscription already gone");
            return;
        }
        let Some(session) = shared.live().filter(|s| s.id == self.session) else {
            return;
        };
        let frame = Frame::new(Command::Unsubscribe).with_header(headers::ID, &self.id);
        match session.send(&frame) {
            Ok(()) => debug!(id = %self.id, "unsubscribed"),
            Err(e) => debug!(id = %self.id, error = %e, "could not queue UNSUBSCRIBE"),
        }
    }
}
