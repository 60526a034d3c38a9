//! Duplex sync with a remote authority: request/response calls plus pushed notifications
//! multiplexed over one transport.
#![forbid(unsafe_code)]

pub mod authority;
mod client;
mod error;
mod forwarder;
pub mod protocol;
pub mod transport;

pub use authority::Authority;
pub use client::{ChunkDelta, SyncClient};
pub use error::SyncError;
pub use forwarder::EditForwarder;
pub use protocol::{ClientId, Frame, Notification, Request, Response};
pub use transport::{FrameSink, FrameSource, Transport};

/// Port used when a server address carries none.
pub const DEFAULT_PORT: u16 = 8421;
