//! STOMP 1.2 framing.
//!
//! A frame is a command line, `name:value` header lines, a blank line, a body
//! and a NUL terminator:
//!
//! ```text
//! MESSAGE
//! subscription:sub-3
//! destination:/topic/room/ABCD
//!
//! {"type":"GAME_STARTED"}\0
//! ```
//!
//! A message consisting only of end-of-line bytes is a heartbeat. Each
//! WebSocket message carries exactly one frame (or one heartbeat), which is how
//! STOMP-over-WebSocket brokers deliver them.

use std::fmt;
use std::time::Duration;

use crate::ProtocolError;

/// The bytes sent as a client heartbeat.
pub const HEARTBEAT: &[u8] = b"\n";

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The STOMP commands this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // client → broker
    Connect,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    // broker → client
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// The command as it appears on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parses a command line. `STOMP` is accepted as a synonym for `CONNECT`.
    pub fn parse(line: &str) -> Option<Self> {
        Some(match line {
            "CONNECT" | "STOMP" => Self::Connect,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "CONNECTED" => Self::Connected,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are sent verbatim (STOMP 1.2 §Value Encoding).
    fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A single STOMP frame.
///
/// Headers keep their wire order; when a name repeats, the first occurrence
/// wins, as STOMP 1.2 requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Result of decoding one inbound WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A bare end-of-line: the broker is alive, nothing else to do.
    Heartbeat,
    /// A complete frame.
    Frame(Frame),
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends a header.
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Looks up a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `CONNECT` advertising STOMP 1.2 and the given `heart-beat` (cx, cy) in ms.
    pub fn connect(host: &str, heartbeat: (u64, u64)) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", host)
            .with_header(
                "heart-beat",
                format!("{},{}", heartbeat.0, heartbeat.1),
            )
    }

    /// `SUBSCRIBE` with automatic acknowledgement.
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// `UNSUBSCRIBE` for a subscription id.
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// `SEND` of an encoded body to a destination.
    pub fn send(destination: &str, content_type: &str, body: Vec<u8>) -> Self {
        let len = body.len();
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", content_type)
            .with_header("content-length", len.to_string())
            .with_body(body)
    }

    /// `DISCONNECT`.
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Serializes the frame, including the trailing NUL.
    pub fn encode(&self) -> Vec<u8> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Parses one inbound message.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidFrame`] for an unknown command, a
    /// malformed header, a bad escape sequence, or a missing NUL terminator.
    pub fn decode(data: &[u8]) -> Result<Decoded, ProtocolError> {
        let Some(start) = data.iter().position(|b| *b != b'\n' && *b != b'\r')
        else {
            return Ok(Decoded::Heartbeat);
        };
        let data = &data[start..];
        let mut pos = 0;

        let line = read_line(data, &mut pos)?;
        let command = Command::parse(line).ok_or_else(|| {
            ProtocolError::InvalidFrame(format!("unknown command `{line}`"))
        })?;

        let mut frame = Frame::new(command);
        loop {
            let line = read_line(data, &mut pos)?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ProtocolError::InvalidFrame(format!("header without `:`: `{line}`"))
            })?;
            if command.escapes_headers() {
                frame.headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                frame.headers.push((name.to_owned(), value.to_owned()));
            }
        }

        let rest = &data[pos..];
        let body_len = match frame.header("content-length") {
            Some(len) => {
                let len: usize = len.trim().parse().map_err(|_| {
                    ProtocolError::InvalidFrame(format!("bad content-length `{len}`"))
                })?;
                if rest.len() <= len || rest[len] != 0 {
                    return Err(ProtocolError::InvalidFrame(
                        "body shorter than content-length or not NUL-terminated".into(),
                    ));
                }
                len
            }
            None => rest.iter().position(|b| *b == 0).ok_or_else(|| {
                ProtocolError::InvalidFrame("missing NUL terminator".into())
            })?,
        };
        frame.body = rest[..body_len].to_vec();
        Ok(Decoded::Frame(frame))
    }
}

/// Reads one header-section line starting at `pos`, without its EOL.
fn read_line<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a str, ProtocolError> {
    let rest = &data[*pos..];
    let end = rest.iter().position(|b| *b == b'\n').ok_or_else(|| {
        ProtocolError::InvalidFrame("unterminated header section".into())
    })?;
    *pos += end + 1;
    let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
    std::str::from_utf8(line)
        .map_err(|_| ProtocolError::InvalidFrame("header is not UTF-8".into()))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(ProtocolError::InvalidFrame(format!(
                    "undefined escape `\\{}`",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Heartbeats
// ---------------------------------------------------------------------------

/// Parses a `heart-beat` header value (`"cx,cy"`, milliseconds).
pub fn parse_heartbeat(value: &str) -> Option<(u64, u64)> {
    let (a, b) = value.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Negotiates heartbeat periods from the client's and broker's `heart-beat`
/// headers. Returns `(outgoing, incoming)`; `None` means disabled in that
/// direction.
///
/// Outgoing is `max(cx, sy)` unless either is 0; incoming is `max(cy, sx)`
/// unless either is 0.
pub fn negotiate_heartbeat(
    client: (u64, u64),
    server: (u64, u64),
) -> (Option<Duration>, Option<Duration>) {
    let outgoing = (client.0 != 0 && server.1 != 0)
        .then(|| Duration::from_millis(client.0.max(server.1)));
    let incoming = (client.1 != 0 && server.0 != 0)
        .then(|| Duration::from_millis(client.1.max(server.0)));
    (outgoing, incoming)
}
