use std::time::Duration;

/// STOMP versions offered in the `accept-version` header, newest first.
pub const STOMP_ACCEPT_VERSION: &str = "1.2,1.1,1.0";

/// Interval at which the client promises to send heart-beats.
pub const HEARTBEAT_OUTGOING: Duration = Duration::from_millis(4000);

/// Interval at which the client wants to receive heart-beats.
pub const HEARTBEAT_INCOMING: Duration = Duration::from_millis(4000);

/// Silence tolerated on the incoming side, as a multiple of the
/// negotiated heart-beat period, before the link is declared dead.
pub const HEARTBEAT_TOLERANCE: u32 = 2;

/// Fixed delay between automatic reconnection attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Upper bound on a single CONNECT/CONNECTED exchange.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base endpoint used when no `EADMS_WS_URL` is supplied.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable carrying the base endpoint URL.
pub const BASE_URL_ENV: &str = "EADMS_WS_URL";

/// Path of the STOMP endpoint registered by the server.
pub const STOMP_ENDPOINT_PATH: &str = "/ws";

/// Suffix of the raw WebSocket transport under a SockJS-enabled endpoint.
pub const RAW_WEBSOCKET_SUFFIX: &str = "/websocket";

/// Maximum WebSocket message size accepted from the server (16 MB).
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Capacity of the outbound frame queue per session.
pub const WRITE_QUEUE_CAPACITY: usize = 256;

/// Content type attached to published JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Header names used by the client.
pub mod headers {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const DESTINATION: &str = "destination";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const HOST: &str = "host";
    pub const ID: &str = "id";
    pub const MESSAGE: &str = "message";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const VERSION: &str = "version";
}
