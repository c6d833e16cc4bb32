//! Session loop with fixed-delay reconnection.
//!
//! Each iteration opens a WebSocket, performs the STOMP handshake and runs
//! the pumps until the socket dies. Lifecycle callbacks fire from here:
//! `on_connect` after every CONNECTED, `on_error` on a broker ERROR and
//! `on_close` whenever an opened socket goes away.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use eadms_protocol::constants::{WRITE_QUEUE_CAPACITY, WS_MAX_MESSAGE_SIZE};

use crate::handshake::perform_handshake;
use crate::pumps::heartbeat::heartbeat_pump;
use crate::pumps::read::read_pump;
use crate::pumps::write::write_pump;
use crate::stomp_client::{Shared, StompError};
use crate::transport::TransportCallbacks;
use crate::types::TransportConfig;

/// Upper bound on flushing the write pump when a session ends.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Runs sessions until cancelled, or until one ends with reconnection
/// disabled (zero delay).
pub(crate) async fn session_loop(
    config: TransportConfig,
    callbacks: TransportCallbacks,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);
        match run_session(&config, &callbacks, &shared, &cancel).await {
            Ok(true) => {
                debug!(url = %config.url, "session ended");
                attempt = 0;
            }
            Ok(false) => {}
            Err(e) => warn!(url = %config.url, attempt, error = %e, "connection attempt failed"),
        }

        if cancel.is_cancelled() {
            break;
        }
        if config.reconnect_delay.is_zero() {
            info!(url = %config.url, "reconnection disabled, giving up");
            break;
        }
        info!(
            delay_ms = config.reconnect_delay.as_millis() as u64,
            "reconnecting"
        );
        if !wait_before_retry(config.reconnect_delay, &cancel).await {
            break;
        }
    }

    shared.end_session();
    debug!(url = %config.url, "session loop stopped");
}

/// Sleeps for `delay`. Returns `false` if cancelled first.
async fn wait_before_retry(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("reconnect cancelled");
            false
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

/// One connection attempt. Returns `Ok(true)` if a STOMP session was
/// established before the socket went away, `Ok(false)` if cancelled
/// before connecting.
async fn run_session(
    config: &TransportConfig,
    callbacks: &TransportCallbacks,
    shared: &Arc<Shared>,
    cancel: &CancellationToken,
) -> Result<bool, StompError> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

    debug!(url = %config.url, "opening WebSocket");
    let connect = tokio_tungstenite::connect_async_with_config(
        config.url.as_str(),
        Some(ws_config),
        false,
    );
    let (ws_stream, _) = tokio::select! {
        _ = cancel.cancelled() => return Ok(false),
        res = tokio::time::timeout(config.connect_timeout, connect) => {
            res.map_err(|_| StompError::HandshakeTimeout)??
        }
    };
    let (write, read) = ws_stream.split();

    let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(WRITE_QUEUE_CAPACITY);
    let session_cancel = cancel.child_token();
    let write_handle = tokio::spawn(write_pump(write, write_rx, session_cancel.clone()));

    let result = drive_session(config, callbacks, shared, read, write_tx, &session_cancel).await;

    shared.end_session();
    session_cancel.cancel();
    if tokio::time::timeout(CLOSE_TIMEOUT, write_handle).await.is_err() {
        debug!("write pump did not stop in time");
    }
    (callbacks.on_close)();
    result
}

/// Handshake, then pumps until the socket dies or the session is cancelled.
async fn drive_session<S>(
    config: &TransportConfig,
    callbacks: &TransportCallbacks,
    shared: &Arc<Shared>,
    mut read: S,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: &CancellationToken,
) -> Result<bool, StompError>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let handshake = tokio::select! {
        _ = cancel.cancelled() => return Ok(false),
        res = perform_handshake(config, &mut read, &write_tx) => res,
    };
    let negotiated = match handshake {
        Ok(negotiated) => negotiated,
        Err(StompError::Rejected(err)) => {
            (callbacks.on_error)(err.clone());
            return Err(StompError::Rejected(err));
        }
        Err(e) => return Err(e),
    };

    shared.begin_session(write_tx.clone());
    info!(
        url = %config.url,
        send_every = ?negotiated.send_every,
        expect_every = ?negotiated.expect_every,
        "STOMP session established"
    );
    (callbacks.on_connect)();

    if let Some(period) = negotiated.send_every {
        tokio::spawn(heartbeat_pump(write_tx, period, cancel.clone()));
    }

    read_pump(
        read,
        shared.clone(),
        callbacks.on_error.clone(),
        negotiated.read_deadline(),
        cancel.clone(),
    )
    .await;
    Ok(true)
}
