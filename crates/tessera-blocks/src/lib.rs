//! Block ids, their render/physics predicates, and the texture atlas table.
#![forbid(unsafe_code)]

pub mod atlas;
pub mod types;

pub use atlas::{AVATAR_BLOCK, BlockTexture, FaceTexture, TextureAtlas};
pub use types::BlockType;
