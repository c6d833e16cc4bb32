//! In-memory transport and log capture shared by unit tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::transport::{
    Connector, RawCallback, SubscriptionHandle, Transport, TransportCallbacks, TransportError,
};
use crate::types::TransportConfig;

/// One recorded call to [`Connector::activate`].
#[derive(Clone)]
pub(crate) struct Activation {
    pub config: TransportConfig,
    pub callbacks: TransportCallbacks,
    pub transport: Arc<MockTransport>,
}

/// Connector that hands out [`MockTransport`]s and records every activation.
#[derive(Default)]
pub(crate) struct MockConnector {
    activations: Mutex<Vec<Activation>>,
}

impl MockConnector {
    pub fn activation_count(&self) -> usize {
        self.activations.lock().unwrap().len()
    }

    pub fn activation(&self, index: usize) -> Activation {
        self.activations.lock().unwrap()[index].clone()
    }

    pub fn last(&self) -> Activation {
        self.activations
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no activation recorded")
    }
}

impl Connector for MockConnector {
    fn activate(
        &self,
        config: TransportConfig,
        callbacks: TransportCallbacks,
    ) -> Box<dyn Transport> {
        let transport = Arc::new(MockTransport::default());
        self.activations.lock().unwrap().push(Activation {
            config,
            callbacks,
            transport: transport.clone(),
        });
        Box::new(transport)
    }
}

#[derive(Default)]
struct MockState {
    next_id: u64,
    active: HashMap<u64, (String, RawCallback)>,
    subscribe_calls: Vec<String>,
    unsubscribe_calls: Vec<String>,
    published: Vec<(String, String)>,
    deactivations: usize,
    publish_error: Option<TransportError>,
    subscribe_error: Option<TransportError>,
}

/// Transport that keeps subscriptions in memory and delivers on demand.
#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        crate::lock(&self.state)
    }

    /// Delivers a raw body to every live subscription on `destination`.
    /// Returns how many callbacks ran.
    pub fn deliver(&self, destination: &str, body: &str) -> usize {
        let targets: Vec<RawCallback> = self
            .state()
            .active
            .values()
            .filter(|(dest, _)| dest == destination)
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in &targets {
            cb(body);
        }
        targets.len()
    }

    pub fn subscribe_calls(&self) -> Vec<String> {
        self.state().subscribe_calls.clone()
    }

    pub fn unsubscribe_calls(&self) -> Vec<String> {
        self.state().unsubscribe_calls.clone()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.state().published.clone()
    }

    pub fn deactivations(&self) -> usize {
        self.state().deactivations
    }

    pub fn active_destinations(&self) -> Vec<String> {
        let mut dests: Vec<String> = self
            .state()
            .active
            .values()
            .map(|(dest, _)| dest.clone())
            .collect();
        dests.sort();
        dests
    }

    pub fn fail_publish_with(&self, err: TransportError) {
        self.state().publish_error = Some(err);
    }

    /// Makes `subscribe` fail with `err`, or succeed again with `None`.
    pub fn fail_subscribe_with(&self, err: Option<TransportError>) {
        self.state().subscribe_error = err;
    }
}

impl Transport for Arc<MockTransport> {
    fn subscribe(
        &self,
        destination: &str,
        on_message: RawCallback,
    ) -> Result<Box<dyn SubscriptionHandle>, TransportError> {
        let mut state = self.state();
        if let Some(err) = state.subscribe_error.clone() {
            return Err(err);
        }
        state.next_id += 1;
        let id = state.next_id;
        state
            .active
            .insert(id, (destination.to_string(), on_message));
        state.subscribe_calls.push(destination.to_string());
        Ok(Box::new(MockHandle {
            id,
            destination: destination.to_string(),
            transport: self.clone(),
        }))
    }

    fn publish(&self, destination: &str, body: String) -> Result<(), TransportError> {
        let mut state = self.state();
        if let Some(err) = state.publish_error.clone() {
            return Err(err);
        }
        state.published.push((destination.to_string(), body));
        Ok(())
    }

    fn deactivate(&self) {
        let mut state = self.state();
        state.deactivations += 1;
        state.active.clear();
    }
}

struct MockHandle {
    id: u64,
    destination: String,
    transport: Arc<MockTransport>,
}

impl SubscriptionHandle for MockHandle {
    fn unsubscribe(&self) {
        let mut state = self.transport.state();
        state.active.remove(&self.id);
        state.unsubscribe_calls.push(self.destination.clone());
    }
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its formatted output.
pub(crate) fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let output = String::from_utf8_lossy(&capture.0.lock().unwrap()).into_owned();
    (result, output)
}
