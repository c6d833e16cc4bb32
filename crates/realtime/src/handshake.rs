//! STOMP CONNECT / CONNECTED handshake.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::debug;

use eadms_protocol::constants::{STOMP_ACCEPT_VERSION, headers};
use eadms_protocol::{Command, Frame, FrameError, HeartBeat, NegotiatedHeartBeat};

use crate::pumps::read::message_text;
use crate::stomp_client::StompError;
use crate::types::{ProtocolError, TransportConfig};

/// Builds the CONNECT frame for `config`.
pub(crate) fn connect_frame(config: &TransportConfig) -> Frame {
    let mut frame = Frame::new(Command::Connect)
        .with_header(headers::ACCEPT_VERSION, STOMP_ACCEPT_VERSION)
        .with_header(headers::HEART_BEAT, config.heartbeat.to_string());
    if let Some(host) = host_of(&config.url) {
        frame = frame.with_header(headers::HOST, host);
    }
    for (name, value) in &config.connect_headers {
        frame = frame.with_header(name.as_str(), value.as_str());
    }
    frame
}

/// Extracts the host (without port or credentials) from a URL.
fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = if host_port.starts_with('[') {
        host_port.split_inclusive(']').next()?
    } else {
        host_port.split(':').next()?
    };
    (!host.is_empty()).then_some(host)
}

/// Sends CONNECT and waits for the broker's answer.
///
/// Returns the negotiated heart-beat schedule on CONNECTED. An ERROR reply
/// becomes [`StompError::Rejected`].
pub(crate) async fn perform_handshake<S>(
    config: &TransportConfig,
    read: &mut S,
    write_tx: &mpsc::Sender<tungstenite::Message>,
) -> Result<NegotiatedHeartBeat, StompError>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let connect = connect_frame(config);
    write_tx
        .send(tungstenite::Message::text(connect.encode()))
        .await
        .map_err(|_| StompError::Closed)?;

    let reply = tokio::time::timeout(config.connect_timeout, next_frame(read))
        .await
        .map_err(|_| StompError::HandshakeTimeout)??;

    match reply.command {
        Command::Connected => {
            let server = match reply.header(headers::HEART_BEAT) {
                Some(value) => value.parse::<HeartBeat>()?,
                None => HeartBeat::default(),
            };
            debug!(
                version = reply.header(headers::VERSION).unwrap_or("1.0"),
                heart_beat = %server,
                "CONNECTED received"
            );
            Ok(HeartBeat::negotiate(config.heartbeat, server))
        }
        Command::Error => Err(StompError::Rejected(ProtocolError::from_frame(&reply))),
        other => Err(StompError::UnexpectedFrame(other)),
    }
}

/// Reads until the first complete frame, skipping heart-beats and control
/// messages.
async fn next_frame<S>(read: &mut S) -> Result<Frame, StompError>
where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        let msg = msg?;
        if let tungstenite::Message::Close(_) = msg {
            return Err(StompError::Closed);
        }
        let Some(text) = message_text(&msg) else {
            if let tungstenite::Message::Binary(_) = msg {
                return Err(FrameError::InvalidUtf8.into());
            }
            continue;
        };
        if let Some(frame) = Frame::decode_message(text)?.into_iter().next() {
            return Ok(frame);
        }
    }
    Err(StompError::Closed)
}
