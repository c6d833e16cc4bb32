//! EADMS listener entry point.
//!
//! Connects with the configured token, follows the user's message and
//! read-receipt queues, and logs what arrives until Ctrl-C.
//!
//! Usage: `eadms-listen [CONFIG_PATH]`

mod config;

use std::path::PathBuf;
use std::time::Duration;

use eadms_protocol::messaging::destinations;
use eadms_realtime::{
    ConnectedCallback, ErrorCallback, ProtocolError, Settings, SubscriptionManager,
};
use tracing_subscriber::EnvFilter;

use crate::config::ListenConfig;

/// Time given to the transport to flush DISCONNECT before the runtime stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting EADMS listener");

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let listen = ListenConfig::load(path.as_deref())?;
    listen.ensure_complete()?;

    let settings = match &listen.base_url {
        Some(url) => Settings::new(url.as_str())?,
        None => Settings::from_env()?,
    };
    tracing::info!(url = settings.stomp_url(), user_id = listen.user_id, "connecting");

    let manager = SubscriptionManager::with_stomp(settings);
    let user_id = listen.user_id;

    // The manager restores registered topics after a reconnect; anything it
    // had to drop is subscribed again here.
    let on_connected: ConnectedCallback = {
        let manager = manager.clone();
        Box::new(move || {
            tracing::info!("connected");
            if !manager.is_subscribed(&destinations::user_messages(user_id)) {
                manager.subscribe_messages(user_id, |msg| {
                    tracing::info!(
                        id = msg.id,
                        from = %msg.sender_name,
                        to = %msg.receiver_name,
                        subject = %msg.subject,
                        "message"
                    );
                });
            }
            if !manager.is_subscribed(&destinations::user_message_read(user_id)) {
                manager.subscribe_read_receipts(user_id, |id| {
                    tracing::info!(id, "message read");
                });
            }
        })
    };
    let on_error: ErrorCallback = Box::new(|err: &ProtocolError| {
        tracing::warn!(reason = %err.message, details = %err.details, "broker rejected session");
    });

    manager.connect(&listen.token, Some(on_connected), Some(on_error));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    manager.disconnect();
    tokio::time::sleep(SHUTDOWN_GRACE).await;

    Ok(())
}
