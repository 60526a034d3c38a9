//! World coordinates, versions, player poses, and deterministic terrain generation.
#![forbid(unsafe_code)]

pub mod coords;
pub mod invariant;
pub mod noise;
pub mod player;
pub mod version;
pub mod worldgen;

pub use coords::{BlockCoord, CHUNK_WIDTH, ChunkCoord};
pub use player::PlayerState;
pub use version::Version;
pub use worldgen::{BlockMap, Generator};
