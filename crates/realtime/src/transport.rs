//! The messaging transport capability consumed by the manager.
//!
//! A [`Connector`] activates a [`Transport`] and reports its lifecycle
//! through [`TransportCallbacks`]. Activation must return immediately;
//! callbacks are invoked later from the transport's own tasks, never from
//! inside the call that triggered them.

use std::sync::Arc;

use crate::types::{ProtocolError, TransportConfig};

/// Callback receiving the raw text body of each message on a destination.
pub type RawCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback for connect and close notifications.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback for protocol-level errors reported by the broker.
pub type ProtocolErrorCallback = Arc<dyn Fn(ProtocolError) + Send + Sync>;

/// Lifecycle notifications delivered by a transport.
#[derive(Clone)]
pub struct TransportCallbacks {
    /// A handshake succeeded. Fired again after every reconnection.
    pub on_connect: LifecycleCallback,
    /// The broker reported an error.
    pub on_error: ProtocolErrorCallback,
    /// The underlying socket closed.
    pub on_close: LifecycleCallback,
}

impl TransportCallbacks {
    /// Callbacks that ignore every notification.
    pub fn noop() -> Self {
        Self {
            on_connect: Arc::new(|| {}),
            on_error: Arc::new(|_| {}),
            on_close: Arc::new(|| {}),
        }
    }
}

/// Errors from transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("outbound queue is full")]
    QueueFull,

    #[error("transport has been deactivated")]
    Deactivated,
}

/// Opaque handle to one transport-level subscription.
pub trait SubscriptionHandle: Send + Sync {
    /// Releases the subscription. Safe to call on a dead session.
    fn unsubscribe(&self);
}

/// An activated transport connection.
pub trait Transport: Send + Sync {
    /// Subscribes to a destination; `on_message` receives each raw body.
    fn subscribe(
        &self,
        destination: &str,
        on_message: RawCallback,
    ) -> Result<Box<dyn SubscriptionHandle>, TransportError>;

    /// Publishes a text body. Fire-and-forget.
    fn publish(&self, destination: &str, body: String) -> Result<(), TransportError>;

    /// Tears down the connection and stops reconnecting.
    fn deactivate(&self);
}

/// Factory for transport connections.
pub trait Connector: Send + Sync {
    /// Begins connecting and returns immediately.
    fn activate(&self, config: TransportConfig, callbacks: TransportCallbacks)
    -> Box<dyn Transport>;
}
