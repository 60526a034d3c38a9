//! Ray picking and player collision against resident chunks.

use tessera_geom::Vec3;
use tessera_world::BlockCoord;

use crate::store::ChunkStore;

const PICK_RANGE: f32 = 8.0;
const PICK_STEP: f32 = 0.125;
const PAD: f32 = 0.25;

impl ChunkStore {
    /// Walks `dir` from `origin` and returns the first solid block together with the cell
    /// visited just before it (where a placed block would go).
    pub fn hit_test(&self, origin: Vec3, dir: Vec3) -> Option<(BlockCoord, Option<BlockCoord>)> {
        let mut prev: Option<BlockCoord> = None;
        let mut len = 0.0f32;
        while len < PICK_RANGE {
            let p = origin + dir * len;
            let b = BlockCoord::nearest(p.x, p.y, p.z);
            if prev != Some(b) && self.has_block(b) {
                return Some((b, prev));
            }
            prev = Some(b);
            len += PICK_STEP;
        }
        None
    }

    /// Pushes a two-block-tall body at `pos` out of neighbouring obstacles. The flag is set
    /// when vertical motion was stopped.
    pub fn collide(&self, pos: Vec3) -> (Vec3, bool) {
        let Vec3 { mut x, mut y, mut z } = pos;
        let (nx, ny, nz) = (pos.x.round(), pos.y.round(), pos.z.round());
        let head = BlockCoord::new(nx as i32, ny as i32, nz as i32);
        let foot = head.down();
        let solid = |b: BlockCoord| self.resident_block(b).is_obstacle();

        let mut stop = false;
        for b in [foot, head] {
            if solid(b.left()) && x < nx && nx - x > PAD {
                x = nx - PAD;
            }
            if solid(b.right()) && x > nx && x - nx > PAD {
                x = nx + PAD;
            }
            if solid(b.down()) && y < ny && ny - y > PAD {
                y = ny - PAD;
                stop = true;
            }
            if solid(b.up()) && y > ny && y - ny > PAD {
                y = ny + PAD;
                stop = true;
            }
            if solid(b.back()) && z < nz && nz - z > PAD {
                z = nz - PAD;
            }
            if solid(b.front()) && z > nz && z - nz > PAD {
                z = nz + PAD;
            }
        }
        (Vec3::new(x, y, z), stop)
    }
}
