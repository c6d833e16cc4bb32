//! STOMP 1.2 frame encoding and decoding.
//!
//! # Wire format
//!
//! ```text
//! COMMAND\n
//! name:value\n        (zero or more, escaped except on CONNECT/CONNECTED)
//! \n
//! body\0
//! ```
//!
//! A WebSocket text message carries zero or more complete frames. Bare
//! EOLs before or between frames are heart-beats.

use std::fmt;
use std::str::FromStr;

use crate::constants::headers;
use crate::error::FrameError;

/// A heart-beat as sent on the wire.
pub const HEARTBEAT_EOL: &str = "\n";

/// STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,

    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Returns the command as written on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are sent verbatim for 1.0 compatibility.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cmd = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are allowed; the first wins.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the value of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Encodes the frame for the wire.
    ///
    /// `content-length` is always computed from the body; a caller-supplied
    /// value is ignored.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());

        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if name == headers::CONTENT_LENGTH {
                continue;
            }
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() {
            out.push_str(headers::CONTENT_LENGTH);
            out.push(':');
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decodes every frame contained in one WebSocket text message.
    ///
    /// Returns an empty list when the message is only heart-beats.
    pub fn decode_message(text: &str) -> Result<Vec<Frame>, FrameError> {
        let bytes = text.as_bytes();
        let mut frames = Vec::new();
        let mut pos = 0;

        loop {
            while pos < bytes.len() && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
                pos += 1;
            }
            if pos >= bytes.len() {
                break;
            }
            let (frame, consumed) = decode_one(&bytes[pos..])?;
            frames.push(frame);
            pos += consumed;
        }

        Ok(frames)
    }
}

/// Returns `true` if the message carries nothing but heart-beat EOLs.
pub fn is_heartbeat(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b == b'\n' || b == b'\r')
}

/// Decodes one frame from the start of `buf`, returning it and the number
/// of bytes consumed (including the NUL terminator).
fn decode_one(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
    let mut cursor = 0;

    let command: Command = read_line(buf, &mut cursor)?.parse()?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = read_line(buf, &mut cursor)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == headers::CONTENT_LENGTH)
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(v.clone()))
        })
        .transpose()?;

    let body = match content_length {
        Some(len) => {
            let end = cursor + len;
            if buf.get(end) != Some(&0) {
                return Err(FrameError::Unterminated);
            }
            let body = &buf[cursor..end];
            cursor = end + 1;
            body
        }
        None => {
            let nul = buf[cursor..]
                .iter()
                .position(|&b| b == 0)
                .ok_or(FrameError::Unterminated)?;
            let body = &buf[cursor..cursor + nul];
            cursor += nul + 1;
            body
        }
    };
    let body = std::str::from_utf8(body)
        .map_err(|_| FrameError::InvalidUtf8)?
        .to_string();

    Ok((
        Frame {
            command,
            headers,
            body,
        },
        cursor,
    ))
}

/// Reads one line (without its `\n` or `\r\n`) and advances the cursor.
fn read_line<'a>(buf: &'a [u8], cursor: &mut usize) -> Result<&'a str, FrameError> {
    let rest = &buf[*cursor..];
    let idx = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(FrameError::Unterminated)?;
    let mut line = &rest[..idx];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    *cursor += idx + 1;
    std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8)
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            _ => return Err(FrameError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}
