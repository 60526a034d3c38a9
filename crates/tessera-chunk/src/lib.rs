//! In-memory block storage: chunks, the bounded chunk store, and block queries.
#![forbid(unsafe_code)]

mod chunk;
mod physics;
mod store;

pub use chunk::Chunk;
pub use store::{ChunkStore, ChunkStoreStats, EvictFn};
