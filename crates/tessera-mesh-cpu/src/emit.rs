//! Vertex assembly. Layout per vertex: position (3), uv (2), normal (3).

use tessera_blocks::{BlockTexture, FaceTexture};
use tessera_world::BlockCoord;

use crate::face::Face;

pub const FLOATS_PER_VERTEX: usize = 8;
pub const VERTICES_PER_FACE: usize = 6;

const LO: f32 = -0.5;
const HI: f32 = 0.5;

// Two triangles per face, corner offsets from the block center. Index 3 repeats 2 and
// index 5 repeats 0.
const QUADS: [[[f32; 3]; 6]; 6] = [
    // left
    [[LO, LO, LO], [LO, LO, HI], [LO, HI, HI], [LO, HI, HI], [LO, HI, LO], [LO, LO, LO]],
    // right
    [[HI, LO, HI], [HI, LO, LO], [HI, HI, LO], [HI, HI, LO], [HI, HI, HI], [HI, LO, HI]],
    // up
    [[LO, HI, HI], [HI, HI, HI], [HI, HI, LO], [HI, HI, LO], [LO, HI, LO], [LO, HI, HI]],
    // down
    [[LO, LO, LO], [HI, LO, LO], [HI, LO, HI], [HI, LO, HI], [LO, LO, HI], [LO, LO, LO]],
    // front
    [[LO, LO, HI], [HI, LO, HI], [HI, HI, HI], [HI, HI, HI], [LO, HI, HI], [LO, LO, HI]],
    // back
    [[HI, LO, LO], [LO, LO, LO], [LO, HI, LO], [LO, HI, LO], [HI, HI, LO], [HI, LO, LO]],
];

// Distinct corners of a quad, walked around its edge.
const RING: [usize; 4] = [0, 1, 2, 4];

fn face_uv(tex: &BlockTexture, face: Face) -> &FaceTexture {
    match face {
        Face::Left => &tex.left,
        Face::Right => &tex.right,
        Face::Up => &tex.up,
        Face::Down => &tex.down,
        Face::Front => &tex.front,
        Face::Back => &tex.back,
    }
}

fn push_quad(
    out: &mut Vec<f32>,
    center: [f32; 3],
    corners: &[[f32; 3]; 6],
    squash: [f32; 3],
    uv: &FaceTexture,
    face: Face,
) {
    let n = face.normal();
    for (c, t) in corners.iter().zip(uv.iter()) {
        out.extend_from_slice(&[
            center[0] + c[0] * squash[0],
            center[1] + c[1] * squash[1],
            center[2] + c[2] * squash[2],
            t[0],
            t[1],
            n.x,
            n.y,
            n.z,
        ]);
    }
}

#[inline]
fn center(b: BlockCoord) -> [f32; 3] {
    [b.x as f32, b.y as f32, b.z as f32]
}

/// Appends the faces of a unit cube at `block` selected by `show`.
pub fn cube_vertices(out: &mut Vec<f32>, show: [bool; 6], block: BlockCoord, tex: &BlockTexture) {
    let c = center(block);
    for face in Face::ALL {
        if show[face.index()] {
            push_quad(out, c, &QUADS[face.index()], [1.0; 3], face_uv(tex, face), face);
        }
    }
}

/// Appends the crossed quads of a plant: the four side faces collapsed onto the block's
/// center planes. Always emitted in full.
pub fn plant_vertices(out: &mut Vec<f32>, block: BlockCoord, tex: &BlockTexture) {
    let c = center(block);
    for face in [Face::Left, Face::Right] {
        push_quad(out, c, &QUADS[face.index()], [0.0, 1.0, 1.0], face_uv(tex, face), face);
    }
    for face in [Face::Front, Face::Back] {
        push_quad(out, c, &QUADS[face.index()], [1.0, 1.0, 0.0], face_uv(tex, face), face);
    }
}

/// Line-list positions (xyz pairs) outlining the selected faces of a unit cube at the origin.
pub fn wireframe_vertices(show: [bool; 6]) -> Vec<f32> {
    let mut out = Vec::new();
    for face in Face::ALL {
        if !show[face.index()] {
            continue;
        }
        let q = &QUADS[face.index()];
        for i in 0..RING.len() {
            let a = q[RING[i]];
            let b = q[RING[(i + 1) % RING.len()]];
            out.extend_from_slice(&a);
            out.extend_from_slice(&b);
        }
    }
    out
}
