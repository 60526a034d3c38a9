//! Durable local cache: block overrides, chunk version stamps, and the player pose.
#![forbid(unsafe_code)]

mod cache;
mod error;
pub mod keys;
pub mod kvlog;

pub use cache::{DurableCache, cache_file_name};
pub use error::StoreError;
pub use kvlog::KvLog;
