//! Real-time notification client for the EADMS portal.
//!
//! [`SubscriptionManager`] owns one messaging transport connection, keeps a
//! registry of topic subscriptions and dispatches decoded payloads to the
//! registered callbacks. The transport is pluggable through [`Connector`];
//! [`StompConnector`] speaks STOMP over a WebSocket with automatic
//! reconnection and heart-beats.

mod handshake;
pub mod manager;
mod messaging;
mod pumps;
pub(crate) mod reconnection;
pub mod settings;
pub mod stomp_client;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use manager::{ConnectedCallback, ErrorCallback, SubscriptionManager};
pub use settings::{Settings, SettingsError};
pub use stomp_client::{StompConnector, StompError, StompTransport};
pub use transport::{
    Connector, RawCallback, SubscriptionHandle, Transport, TransportCallbacks, TransportError,
};
pub use types::{ConnectionState, ProtocolError, TransportConfig};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a callback panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
