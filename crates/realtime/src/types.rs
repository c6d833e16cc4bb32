//! Public types shared by the manager and the transports.

use std::time::Duration;

use eadms_protocol::constants::{
    CONNECT_TIMEOUT, HEARTBEAT_INCOMING, HEARTBEAT_OUTGOING, RECONNECT_DELAY, headers,
};
use eadms_protocol::{Frame, HeartBeat};

/// Connection state of the subscription manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No live session. Publish and subscribe are rejected.
    #[default]
    Disconnected,
    /// Transport activated, handshake not yet confirmed.
    Connecting,
    /// Handshake confirmed by the broker.
    Connected,
}

/// Configuration handed to a [`Connector`](crate::Connector) on activation.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// WebSocket URL of the broker endpoint.
    pub url: String,
    /// Extra headers sent with the handshake (e.g. `Authorization`).
    pub connect_headers: Vec<(String, String)>,
    /// Fixed delay between reconnection attempts. Zero disables reconnection.
    pub reconnect_delay: Duration,
    /// Heart-beat offer sent with the handshake.
    pub heartbeat: HeartBeat,
    /// Upper bound on a single handshake attempt.
    pub connect_timeout: Duration,
}

impl TransportConfig {
    /// Creates a config with the default reconnect and heart-beat policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_headers: Vec::new(),
            reconnect_delay: RECONNECT_DELAY,
            heartbeat: HeartBeat::new(HEARTBEAT_OUTGOING, HEARTBEAT_INCOMING),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Appends a handshake header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connect_headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first handshake header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.connect_headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Protocol-level failure reported by the broker (a STOMP `ERROR` frame).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("broker error: {message}")]
pub struct ProtocolError {
    /// Short description from the `message` header.
    pub message: String,
    /// Detailed description from the frame body, if any.
    pub details: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
        }
    }

    /// Builds the error from an `ERROR` frame.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            message: frame
                .header(headers::MESSAGE)
                .unwrap_or("unspecified error")
                .to_string(),
            details: frame.body.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eadms_protocol::Command;

    #[test]
    fn connection_state_default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_ne!(ConnectionState::Connected, ConnectionState::Connecting);
    }

    #[test]
    fn transport_config_defaults() {
        let config = TransportConfig::new("ws://localhost:8080/ws/websocket");
        assert_eq!(config.reconnect_delay, Duration::from_secs(5));
        assert_eq!(config.heartbeat.to_string(), "4000,4000");
        assert!(config.connect_headers.is_empty());
    }

    #[test]
    fn transport_config_headers() {
        let config = TransportConfig::new("ws://x")
            .with_header("Authorization", "Bearer tok-1")
            .with_header("Authorization", "Bearer ignored");
        assert_eq!(config.header("Authorization"), Some("Bearer tok-1"));
        assert_eq!(config.header("missing"), None);
    }

    #[test]
    fn protocol_error_from_frame() {
        let frame = Frame::new(Command::Error)
            .with_header("message", "Invalid token")
            .with_body("JWT expired");
        let err = ProtocolError::from_frame(&frame);
        assert_eq!(err.message, "Invalid token");
        assert_eq!(err.details, "JWT expired");
        assert_eq!(err.to_string(), "broker error: Invalid token");

        let bare = ProtocolError::from_frame(&Frame::new(Command::Error));
        assert_eq!(bare.message, "unspecified error");
    }
}
