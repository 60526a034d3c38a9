//! CPU meshing: per-block face culling and vertex assembly for chunks.
#![forbid(unsafe_code)]

mod build;
mod emit;
mod face;
mod source;

pub use build::{VertexData, build_chunk_mesh, visible_faces};
pub use emit::{FLOATS_PER_VERTEX, VERTICES_PER_FACE, cube_vertices, plant_vertices, wireframe_vertices};
pub use face::Face;
pub use source::BlockSource;
