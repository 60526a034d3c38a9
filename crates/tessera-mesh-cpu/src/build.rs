use tessera_blocks::TextureAtlas;
use tessera_chunk::Chunk;
use tessera_world::{BlockCoord, fatal_invariant};

use crate::emit::{FLOATS_PER_VERTEX, VERTICES_PER_FACE, cube_vertices, plant_vertices};
use crate::face::Face;
use crate::source::BlockSource;

/// Interleaved vertex stream ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexData {
    pub data: Vec<f32>,
}

impl VertexData {
    #[inline]
    pub fn vertices(&self) -> usize {
        self.data.len() / FLOATS_PER_VERTEX
    }

    #[inline]
    pub fn faces(&self) -> usize {
        self.vertices() / VERTICES_PER_FACE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Faces of `b` that border a transparent neighbour, in `Face` order. The bottom face of
/// the lowest layer is never shown.
pub fn visible_faces(source: &impl BlockSource, b: BlockCoord) -> [bool; 6] {
    let mut show = [false; 6];
    for face in Face::ALL {
        show[face.index()] = source.block(face.neighbor(b)).is_transparent();
    }
    if b.y == 0 {
        show[Face::Down.index()] = false;
    }
    show
}

pub fn build_chunk_mesh(chunk: &Chunk, source: &impl BlockSource, atlas: &TextureAtlas) -> VertexData {
    let mut data = Vec::new();
    for (b, w) in chunk.snapshot() {
        fatal_invariant!(!w.is_air(), "air stored at {b:?} in chunk {:?}", chunk.coord());
        let tex = atlas.texture(w);
        if w.is_plant() {
            plant_vertices(&mut data, b, tex);
        } else {
            cube_vertices(&mut data, visible_faces(source, b), b, tex);
        }
    }
    let out = VertexData { data };
    log::trace!(target: "mesh", "chunk {:?}: {} faces", chunk.coord(), out.faces());
    out
}
