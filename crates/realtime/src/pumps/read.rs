//! WebSocket read pump: decodes STOMP frames and dispatches them.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use eadms_protocol::constants::{WS_MAX_MESSAGE_SIZE, headers};
use eadms_protocol::frame::is_heartbeat;
use eadms_protocol::{Command, Frame};

use crate::stomp_client::Shared;
use crate::transport::ProtocolErrorCallback;
use crate::types::ProtocolError;

/// Returns the text payload of a data message.
pub(crate) fn message_text(msg: &tungstenite::Message) -> Option<&str> {
    match msg {
        tungstenite::Message::Text(text) => Some(text.as_str()),
        tungstenite::Message::Binary(data) => std::str::from_utf8(data).ok(),
        _ => None,
    }
}

/// Reads frames until the socket closes, the broker sends `ERROR`, the
/// read deadline expires, or the session is cancelled.
///
/// Any incoming message resets the deadline. With no deadline the broker
/// is not expected to send heart-beats and silence is tolerated.
pub(crate) async fn read_pump<S>(
    mut read: S,
    shared: Arc<Shared>,
    on_error: ProtocolErrorCallback,
    read_deadline: Option<Duration>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(read_deadline.unwrap_or_default());
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut deadline, if read_deadline.is_some() => {
                warn!(deadline = ?read_deadline, "no data from broker within heart-beat deadline, closing");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        if let Some(period) = read_deadline {
                            deadline.as_mut().reset(tokio::time::Instant::now() + period);
                        }

                        match msg {
                            // tungstenite queues the pong itself.
                            tungstenite::Message::Ping(_) => {
                                trace!("received ping");
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(frame) => {
                                debug!(frame = ?frame, "received close frame");
                                break;
                            }
                            other => {
                                let Some(text) = message_text(&other) else {
                                    warn!("dropping non UTF-8 binary message");
                                    continue;
                                };
                                if handle_text(text, &shared, &on_error).is_break() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }
}

/// Handles one text message. Breaks when the broker reported an error.
fn handle_text(text: &str, shared: &Shared, on_error: &ProtocolErrorCallback) -> ControlFlow<()> {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return ControlFlow::Continue(());
    }
    if is_heartbeat(text) {
        trace!("heart-beat received");
        return ControlFlow::Continue(());
    }

    let frames = match Frame::decode_message(text) {
        Ok(frames) => frames,
        Err(e) => {
            warn!("failed to decode frame: {e}");
            return ControlFlow::Continue(());
        }
    };

    for frame in frames {
        match frame.command {
            Command::Message => shared.dispatch(&frame),
            Command::Error => {
                let err = ProtocolError::from_frame(&frame);
                warn!(reason = %err.message, "broker sent ERROR");
                on_error(err);
                return ControlFlow::Break(());
            }
            Command::Receipt => {
                debug!(receipt = frame.header(headers::RECEIPT_ID).unwrap_or_default(), "receipt");
            }
            other => debug!(command = %other, "ignoring unexpected frame"),
        }
    }
    ControlFlow::Continue(())
}
