use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    /// The file exists but does not start with the expected magic.
    BadHeader,
    KeyTooLong(usize),
    /// Another handle already owns the file.
    Locked(PathBuf),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "cache io: {e}"),
            StoreError::BadHeader => write!(f, "cache file header mismatch"),
            StoreError::KeyTooLong(n) => write!(f, "cache key of {n} bytes exceeds limit"),
            StoreError::Locked(p) => write!(f, "cache {} is in use by another handle", p.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}
