use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SyncError {
    /// The connection is gone; the caller should carry on with local state only.
    Disconnected,
    Io(io::Error),
    Codec(serde_json::Error),
    /// The peer broke the framing contract (e.g. no greeting).
    Protocol(String),
    /// The authority rejected the call.
    Remote(String),
}

impl SyncError {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, SyncError::Disconnected)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Disconnected => write!(f, "disconnected from server"),
            SyncError::Io(e) => write!(f, "sync io: {e}"),
            SyncError::Codec(e) => write!(f, "sync codec: {e}"),
            SyncError::Protocol(m) => write!(f, "sync protocol: {m}"),
            SyncError::Remote(m) => write!(f, "server error: {m}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Io(e) => Some(e),
            SyncError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SyncError {
    fn from(e: io::Error) -> Self {
        SyncError::Io(e)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Codec(e)
    }
}
