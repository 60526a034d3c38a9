//! Deterministic terrain for one chunk: sand/grass columns, flowers, trees, clouds.
//!
//! Every threshold below is fixed; changing one changes every world ever generated.

use hashbrown::HashMap;
use tessera_blocks::BlockType;

use crate::coords::{BlockCoord, CHUNK_WIDTH, ChunkCoord};
use crate::noise::FractalNoise;

pub type BlockMap = HashMap<BlockCoord, BlockType>;

const SAND_LEVEL: i32 = 12;
const TREE_MARGIN: i32 = 4;
const CLOUD_BAND: std::ops::Range<i32> = 64..72;

pub struct Generator {
    seed: i32,
    noise: FractalNoise,
}

impl Generator {
    pub fn new(seed: i32) -> Self {
        Self {
            seed,
            noise: FractalNoise::new(seed),
        }
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    /// Surface height and material for one column.
    pub fn column(&self, x: i32, z: i32) -> (i32, BlockType) {
        let (fx, fz) = (x as f32, z as f32);
        let f = self.noise.noise2(fx * 0.01, fz * 0.01, 4, 0.5, 2.0);
        let g = self.noise.noise2(-fx * 0.01, -fz * 0.01, 2, 0.9, 2.0);
        let mh = (g * 32.0 + 16.0) as i32;
        let h = (f * mh as f32) as i32;
        if h <= SAND_LEVEL {
            (SAND_LEVEL, BlockType::SAND)
        } else {
            (h, BlockType::GRASS)
        }
    }

    pub fn generate(&self, coord: ChunkCoord) -> BlockMap {
        let mut m = BlockMap::new();
        let (x0, z0) = coord.origin();
        for dx in 0..CHUNK_WIDTH {
            for dz in 0..CHUNK_WIDTH {
                let (x, z) = (x0 + dx, z0 + dz);
                let (h, surface) = self.column(x, z);
                for y in 0..h {
                    m.insert(BlockCoord::new(x, y, z), surface);
                }
                if surface == BlockType::GRASS {
                    self.place_flowers(&mut m, x, h, z);
                    let inside = dx - TREE_MARGIN >= 0
                        && dz - TREE_MARGIN >= 0
                        && dx + TREE_MARGIN <= CHUNK_WIDTH
                        && dz + TREE_MARGIN <= CHUNK_WIDTH;
                    if inside && self.noise.noise2(x as f32, z as f32, 6, 0.5, 2.0) > 0.79 {
                        place_tree(&mut m, x, h, z);
                    }
                }
                self.place_clouds(&mut m, x, z);
            }
        }
        m
    }

    fn place_flowers(&self, m: &mut BlockMap, x: i32, h: i32, z: i32) {
        let (fx, fz) = (x as f32, z as f32);
        if self.noise.noise2(-fx * 0.1, fz * 0.1, 4, 0.8, 2.0) > 0.6 {
            m.insert(BlockCoord::new(x, h, z), BlockType::TALL_GRASS);
        }
        if self.noise.noise2(fx * 0.05, -fz * 0.05, 4, 0.8, 2.0) > 0.7 {
            let pick = (self.noise.noise2(fx * 0.1, fz * 0.1, 4, 0.8, 2.0) * 7.0) as i32;
            m.insert(
                BlockCoord::new(x, h, z),
                BlockType(BlockType::FLOWER_FIRST.id() + pick),
            );
        }
    }

    fn place_clouds(&self, m: &mut BlockMap, x: i32, z: i32) {
        for y in CLOUD_BAND {
            let v = self
                .noise
                .noise3(x as f32 * 0.01, y as f32 * 0.1, z as f32 * 0.01, 8, 0.5, 2.0);
            if v > 0.69 {
                m.insert(BlockCoord::new(x, y, z), BlockType::CLOUD);
            }
        }
    }
}

fn place_tree(m: &mut BlockMap, x: i32, h: i32, z: i32) {
    for y in (h + 3)..(h + 8) {
        for ox in -3..=3 {
            for oz in -3..=3 {
                let oy = y - h - 4;
                if ox * ox + oz * oz + oy * oy < 11 {
                    m.insert(BlockCoord::new(x + ox, y, z + oz), BlockType::LEAVES);
                }
            }
        }
    }
    for y in h..(h + 7) {
        m.insert(BlockCoord::new(x, y, z), BlockType::WOOD);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_trunk_overrides_leaves() {
        let mut m = BlockMap::new();
        place_tree(&mut m, 10, 20, 10);
        assert_eq!(m.get(&BlockCoord::new(10, 24, 10)), Some(&BlockType::WOOD));
        assert_eq!(m.get(&BlockCoord::new(10, 27, 10)), Some(&BlockType::LEAVES));
        assert_eq!(m.get(&BlockCoord::new(13, 24, 10)), None);
        assert_eq!(m.get(&BlockCoord::new(12, 24, 11)), Some(&BlockType::LEAVES));
    }
}
