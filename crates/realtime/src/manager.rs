//! Subscription manager owning one transport connection.
//!
//! Tracks the connection state, keeps a registry of active topic
//! subscriptions keyed by destination, and dispatches decoded payloads to
//! the registered callbacks. Every public operation degrades to a logged
//! no-op when its preconditions are not met; nothing here returns an error
//! to the caller.
//!
//! Subscriptions survive transport-level drops: whenever the transport
//! completes a new handshake, every registry entry is re-established on the
//! new session.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use eadms_protocol::constants::headers;

use crate::lock;
use crate::settings::Settings;
use crate::stomp_client::StompConnector;
use crate::transport::{
    Connector, LifecycleCallback, ProtocolErrorCallback, RawCallback, SubscriptionHandle,
    Transport, TransportCallbacks,
};
use crate::types::{ConnectionState, ProtocolError, TransportConfig};

/// Invoked after every successful handshake.
pub type ConnectedCallback = Box<dyn Fn() + Send + Sync>;

/// Invoked when the broker reports a protocol-level error.
pub type ErrorCallback = Box<dyn Fn(&ProtocolError) + Send + Sync>;

struct Subscription {
    handle: Box<dyn SubscriptionHandle>,
    on_message: RawCallback,
}

#[derive(Default)]
struct Session {
    state: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    /// Bumped on every connect and disconnect; notifications carrying an
    /// older value come from a replaced transport.
    generation: u64,
}

#[derive(Default)]
struct Inner {
    session: Mutex<Session>,
    registry: Mutex<HashMap<String, Subscription>>,
}

/// Real-time subscription manager.
///
/// Cheap to clone; clones share the same connection and registry. Call
/// [`disconnect`](Self::disconnect) at teardown to release the transport.
#[derive(Clone)]
pub struct SubscriptionManager {
    settings: Settings,
    connector: Arc<dyn Connector>,
    inner: Arc<Inner>,
}

impl SubscriptionManager {
    /// Creates a manager that connects through `connector`.
    pub fn new(settings: Settings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings,
            connector,
            inner: Arc::new(Inner::default()),
        }
    }

    /// Creates a manager backed by the STOMP-over-WebSocket transport.
    pub fn with_stomp(settings: Settings) -> Self {
        Self::new(settings, Arc::new(StompConnector))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Starts connecting with `token` as bearer credential.
    ///
    /// Returns immediately. No-op when already connected; otherwise any
    /// previous transport is replaced and deactivated.
    pub fn connect(
        &self,
        token: &str,
        on_connected: Option<ConnectedCallback>,
        on_error: Option<ErrorCallback>,
    ) {
        let previous = {
            let mut session = lock(&self.inner.session);
            if session.state == ConnectionState::Connected {
                debug!("already connected, ignoring connect");
                return;
            }
            session.generation += 1;
            session.state = ConnectionState::Connecting;

            let config = TransportConfig::new(self.settings.stomp_url())
                .with_header(headers::AUTHORIZATION, format!("Bearer {token}"));
            let callbacks =
                lifecycle_callbacks(&self.inner, session.generation, on_connected, on_error);

            info!(url = %config.url, "connecting");
            let transport: Arc<dyn Transport> =
                Arc::from(self.connector.activate(config, callbacks));
            session.transport.replace(transport)
        };

        if let Some(previous) = previous {
            debug!("replacing previous transport");
            previous.deactivate();
        }
    }

    /// Releases every subscription and deactivates the transport.
    ///
    /// No-op when there is no transport, so repeated calls are safe.
    pub fn disconnect(&self) {
        let transport = {
            let mut session = lock(&self.inner.session);
            let Some(transport) = session.transport.take() else {
                debug!("no active connection, ignoring disconnect");
                return;
            };
            session.generation += 1;
            session.state = ConnectionState::Disconnected;
            transport
        };

        let released: Vec<(String, Subscription)> =
            lock(&self.inner.registry).drain().collect();
        let count = released.len();
        for (topic, subscription) in released {
            debug!(topic = %topic, "releasing subscription");
            subscription.handle.unsubscribe();
        }

        transport.deactivate();
        info!(released = count, "disconnected");
    }

    /// Subscribes `callback` to JSON payloads on `topic`.
    ///
    /// Ignored with an error log unless connected. A second subscription to
    /// the same topic is ignored and keeps the original callback. Payloads
    /// that fail to decode are logged and skipped.
    pub fn subscribe<T, F>(&self, topic: &str, callback: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let Some(transport) = self.inner.connected_transport() else {
            error!(topic = %topic, "cannot subscribe: not connected");
            return;
        };
        if self.is_subscribed(topic) {
            info!(topic = %topic, "already subscribed");
            return;
        }

        let on_message = decoding_callback(topic, callback);
        let handle = match transport.subscribe(topic, on_message.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                error!(topic = %topic, error = %e, "subscribe failed");
                return;
            }
        };

        let raced = {
            let mut registry = lock(&self.inner.registry);
            match registry.entry(topic.to_string()) {
                Entry::Occupied(_) => Some(handle),
                Entry::Vacant(slot) => {
                    slot.insert(Subscription { handle, on_message });
                    None
                }
            }
        };
        match raced {
            Some(handle) => {
                info!(topic = %topic, "already subscribed");
                handle.unsubscribe();
            }
            None => debug!(topic = %topic, "subscribed"),
        }
    }

    /// Releases the subscription on `topic`, if any.
    pub fn unsubscribe(&self, topic: &str) {
        let removed = lock(&self.inner.registry).remove(topic);
        let Some(subscription) = removed else {
            debug!(topic = %topic, "not subscribed, ignoring unsubscribe");
            return;
        };
        subscription.handle.unsubscribe();
        debug!(topic = %topic, "unsubscribed");
    }

    /// Publishes `payload` as JSON to `topic`. Fire-and-forget.
    pub fn send<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) {
        let Some(transport) = self.inner.connected_transport() else {
            error!(topic = %topic, "cannot send: not connected");
            return;
        };
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                error!(topic = %topic, error = %e, "failed to encode payload");
                return;
            }
        };
        if let Err(e) = transport.publish(topic, body) {
            error!(topic = %topic, error = %e, "send failed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.session).state
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        lock(&self.inner.registry).contains_key(topic)
    }

    /// Topics currently in the registry, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = lock(&self.inner.registry).keys().cloned().collect();
        topics.sort();
        topics
    }
}

impl Inner {
    fn connected_transport(&self) -> Option<Arc<dyn Transport>> {
        let session = lock(&self.session);
        match session.state {
            ConnectionState::Connected => session.transport.clone(),
            _ => None,
        }
    }

    /// Marks the session connected if `generation` is current.
    fn mark_connected(&self, generation: u64) -> Option<Arc<dyn Transport>> {
        let mut session = lock(&self.session);
        if session.generation != generation {
            return None;
        }
        session.state = ConnectionState::Connected;
        session.transport.clone()
    }

    /// Marks the session disconnected if `generation` is current.
    fn mark_disconnected(&self, generation: u64) -> bool {
        let mut session = lock(&self.session);
        if session.generation != generation {
            return false;
        }
        session.state = ConnectionState::Disconnected;
        true
    }

    /// Re-establishes every registry entry on a fresh session.
    ///
    /// An entry that cannot be re-subscribed is dropped from the registry so
    /// the caller can subscribe again.
    fn restore_subscriptions(&self, transport: &Arc<dyn Transport>) {
        let snapshot: Vec<(String, RawCallback)> = lock(&self.registry)
            .iter()
            .map(|(topic, sub)| (topic.clone(), sub.on_message.clone()))
            .collect();

        for (topic, on_message) in snapshot {
            match transport.subscribe(&topic, on_message.clone()) {
                Ok(handle) => self.replace_handle(&topic, &on_message, handle),
                Err(e) => {
                    error!(topic = %topic, error = %e, "failed to restore subscription, dropping it");
                    self.forget(&topic, &on_message);
                }
            }
        }
    }

    /// Swaps in `handle` if the entry for `topic` still holds `on_message`.
    fn replace_handle(
        &self,
        topic: &str,
        on_message: &RawCallback,
        handle: Box<dyn SubscriptionHandle>,
    ) {
        let stale = {
            let mut registry = lock(&self.registry);
            match registry.get_mut(topic) {
                Some(entry) if Arc::ptr_eq(&entry.on_message, on_message) => {
                    Ok(std::mem::replace(&mut entry.handle, handle))
                }
                _ => Err(handle),
            }
        };
        match stale {
            // No-op when the replaced handle belongs to a dead session.
            Ok(previous) => {
                previous.unsubscribe();
                debug!(topic = %topic, "subscription restored");
            }
            // Unsubscribed while restoring.
            Err(orphaned) => orphaned.unsubscribe(),
        }
    }

    /// Removes the entry for `topic` if it still holds `on_message`.
    fn forget(&self, topic: &str, on_message: &RawCallback) {
        let removed = {
            let mut registry = lock(&self.registry);
            let current = registry
                .get(topic)
                .is_some_and(|entry| Arc::ptr_eq(&entry.on_message, on_message));
            if current { registry.remove(topic) } else { None }
        };
        if let Some(subscription) = removed {
            subscription.handle.unsubscribe();
        }
    }
}

fn lifecycle_callbacks(
    inner: &Arc<Inner>,
    generation: u64,
    on_connected: Option<ConnectedCallback>,
    on_error: Option<ErrorCallback>,
) -> TransportCallbacks {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let on_connect: LifecycleCallback = {
        let weak = weak.clone();
        Arc::new(move || {
            let Some(inner) = weak.upgrade() else { return };
            let Some(transport) = inner.mark_connected(generation) else {
                debug!(generation, "ignoring connect from replaced transport");
                return;
            };
            info!("connected");
            inner.restore_subscriptions(&transport);
            if let Some(cb) = &on_connected {
                cb();
            }
        })
    };

    let on_error: ProtocolErrorCallback = {
        let weak = weak.clone();
        Arc::new(move |err: ProtocolError| {
            let Some(inner) = weak.upgrade() else { return };
            if !inner.mark_disconnected(generation) {
                debug!(generation, "ignoring error from replaced transport");
                return;
            }
            error!(reason = %err.message, details = %err.details, "broker reported an error");
            if let Some(cb) = &on_error {
                cb(&err);
            }
        })
    };

    let on_close: LifecycleCallback = Arc::new(move || {
        let Some(inner) = weak.upgrade() else { return };
        if inner.mark_disconnected(generation) {
            info!("connection closed");
        }
    });

    TransportCallbacks {
        on_connect,
        on_error,
        on_close,
    }
}

fn decoding_callback<T, F>(topic: &str, callback: F) -> RawCallback
where
    T: DeserializeOwned + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let topic = topic.to_string();
    Arc::new(move |raw: &str| match serde_json::from_str::<T>(raw) {
        Ok(value) => callback(value),
        Err(e) => error!(topic = %topic, error = %e, "dropping undecodable message"),
    })
}
