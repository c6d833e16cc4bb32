//! WebSocket write pump: serialises outbound frames.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// Writes queued messages to the WebSocket until cancelled.
///
/// On cancellation, frames already queued (such as a final `DISCONNECT`)
/// are flushed before the close frame.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                while let Ok(m) = write_rx.try_recv() {
                    if write.send(m).await.is_err() {
                        break;
                    }
                }
                break;
            }
            msg = write_rx.recv() => {
                match msg {
                    Some(m) => {
                        if let Err(e) = write.send(m).await {
                            error!("WebSocket write error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    trace!("write pump stopped");
    let _ = write.send(tungstenite::Message::Close(None)).await;
}
