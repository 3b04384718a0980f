//! Error types for rostik

use std::fmt;

/// A failure reported by the remote device via a `!trap` or `!fatal` sentence.
///
/// The device's message and attribute pairs are carried verbatim so callers
/// can pattern-match on known failure text (for example `"already exists"`)
/// to implement upsert semantics in a domain layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    /// The device's `message` attribute, or a rendering of the whole
    /// sentence when no `message` attribute was present.
    pub message: String,

    /// All attribute pairs of the offending sentence, in encounter order.
    pub attributes: Vec<(String, String)>,

    /// Whether the sentence was `!fatal` (connection-ending) rather than
    /// `!trap` (request-scoped).
    pub fatal: bool,
}

impl DeviceFailure {
    /// Looks up an attribute by name, last-write-wins.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for DeviceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from RouterOS device: {}", self.message)
    }
}

/// Unified error type for all rostik operations
#[derive(Debug)]
pub enum RostikError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error (bad address, API misuse)
    Config(String),

    /// Protocol framing error (malformed length prefix, truncated sentence).
    /// Fatal to the connection; there is no way to resynchronize mid-stream.
    Protocol(String),

    /// The device rejected or failed a command (`!trap`/`!fatal`)
    Device(DeviceFailure),

    /// A reply sentence carried a control word outside the known set
    UnknownReply(String),

    /// Authentication error (rejected credentials, undecodable challenge)
    Auth(String),

    /// The connection closed while a request was pending
    Closed(String),
}

impl fmt::Display for RostikError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RostikError::Io(e) => write!(f, "IO error: {}", e),
            RostikError::Config(msg) => write!(f, "Configuration error: {}", msg),
            RostikError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            RostikError::Device(failure) => write!(f, "{}", failure),
            RostikError::UnknownReply(msg) => write!(f, "Unknown reply: {}", msg),
            RostikError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            RostikError::Closed(msg) => write!(f, "Connection closed: {}", msg),
        }
    }
}

impl std::error::Error for RostikError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RostikError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RostikError {
    fn from(err: std::io::Error) -> Self {
        RostikError::Io(err)
    }
}

/// Result type for rostik operations
pub type RostikResult<T> = Result<T, RostikError>;
