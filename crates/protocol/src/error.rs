//! Error types for the STOMP codec.

/// Errors produced while decoding STOMP frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("frame is not terminated by NUL")]
    Unterminated,

    #[error("frame body is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid heart-beat header: {0}")]
    InvalidHeartBeat(String),
}
