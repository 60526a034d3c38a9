use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::types::BlockType;

/// Tiles per atlas row.
pub const ATLAS_COLUMNS: u32 = 16;
const TILE_INSET: f32 = 1.0 / 2048.0;

/// UVs for the six vertices (two triangles) of one face.
pub type FaceTexture = [[f32; 2]; 6];

pub fn face_texture(tile: u32) -> FaceTexture {
    let mut m = 1.0 / ATLAS_COLUMNS as f32;
    let dx = (tile % ATLAS_COLUMNS) as f32 * m;
    let dy = (tile / ATLAS_COLUMNS) as f32 * m;
    let n = TILE_INSET;
    m -= n;
    [
        [dx + n, dy + n],
        [dx + m, dy + n],
        [dx + m, dy + m],
        [dx + m, dy + m],
        [dx + n, dy + m],
        [dx + n, dy + n],
    ]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockTexture {
    pub left: FaceTexture,
    pub right: FaceTexture,
    pub up: FaceTexture,
    pub down: FaceTexture,
    pub front: FaceTexture,
    pub back: FaceTexture,
}

impl BlockTexture {
    /// Tiles in the order left, right, up, down, front, back.
    pub fn from_tiles(t: [u32; 6]) -> Self {
        Self {
            left: face_texture(t[0]),
            right: face_texture(t[1]),
            up: face_texture(t[2]),
            down: face_texture(t[3]),
            front: face_texture(t[4]),
            back: face_texture(t[5]),
        }
    }
}

// id => left, right, up, down, front, back
const DEFAULT_TILES: &[(i32, [u32; 6])] = &[
    (0, [0, 0, 0, 0, 0, 0]),
    (1, [16, 16, 32, 0, 16, 16]),
    (2, [1, 1, 1, 1, 1, 1]),
    (3, [2, 2, 2, 2, 2, 2]),
    (4, [3, 3, 3, 3, 3, 3]),
    (5, [20, 20, 36, 4, 20, 20]),
    (6, [5, 5, 5, 5, 5, 5]),
    (7, [6, 6, 6, 6, 6, 6]),
    (8, [7, 7, 7, 7, 7, 7]),
    (9, [24, 24, 40, 8, 24, 24]),
    (10, [9, 9, 9, 9, 9, 9]),
    (11, [10, 10, 10, 10, 10, 10]),
    (12, [11, 11, 11, 11, 11, 11]),
    (13, [12, 12, 12, 12, 12, 12]),
    (14, [13, 13, 13, 13, 13, 13]),
    (15, [14, 14, 14, 14, 14, 14]),
    (16, [15, 15, 15, 15, 15, 15]),
    (17, [48, 48, 0, 0, 48, 48]),
    (18, [49, 49, 0, 0, 49, 49]),
    (19, [50, 50, 0, 0, 50, 50]),
    (20, [51, 51, 0, 0, 51, 51]),
    (21, [52, 52, 0, 0, 52, 52]),
    (22, [53, 53, 0, 0, 53, 53]),
    (23, [54, 54, 0, 0, 54, 54]),
    (64, [226, 224, 241, 209, 227, 225]),
];

/// Block id to per-face atlas UVs.
#[derive(Clone, Debug)]
pub struct TextureAtlas {
    textures: HashMap<i32, BlockTexture>,
    fallback: BlockTexture,
}

impl Default for TextureAtlas {
    fn default() -> Self {
        let mut textures = HashMap::new();
        for &(id, tiles) in DEFAULT_TILES {
            textures.insert(id, BlockTexture::from_tiles(tiles));
        }
        // unused plant ids fall back to tile 0
        for id in 24..=31 {
            textures.entry(id).or_insert(BlockTexture::from_tiles([0; 6]));
        }
        // single-tile solid colors
        for id in 32..=63 {
            let tile = 176 + (id - 32) as u32;
            textures.insert(id, BlockTexture::from_tiles([tile; 6]));
        }
        Self {
            textures,
            fallback: BlockTexture::from_tiles([0; 6]),
        }
    }
}

impl TextureAtlas {
    pub fn texture(&self, block: BlockType) -> &BlockTexture {
        match self.textures.get(&block.id()) {
            Some(t) => t,
            None => {
                log::debug!(target: "blocks", "no texture for block {}", block.id());
                &self.fallback
            }
        }
    }

    /// Placeable ids, in ascending order. The avatar id (64) is not placeable.
    pub fn palette(&self) -> Vec<BlockType> {
        let mut ids: Vec<i32> = self
            .textures
            .keys()
            .copied()
            .filter(|&id| id > 0 && id < AVATAR_BLOCK.id())
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(BlockType).collect()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Overrides entries from a TOML table such as `[tiles]\n"1" = [16, 16, 32, 0, 16, 16]`.
    pub fn merge_toml_str(&mut self, toml_str: &str) -> Result<(), Box<dyn Error>> {
        let cfg: AtlasConfig = toml::from_str(toml_str)?;
        for (key, tiles) in cfg.tiles {
            let id: i32 = key
                .trim()
                .parse()
                .map_err(|e| format!("atlas key {key:?}: {e}"))?;
            self.textures.insert(id, BlockTexture::from_tiles(tiles));
        }
        Ok(())
    }

    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        self.merge_toml_str(&s)
    }
}

/// Texture used for remote player avatars.
pub const AVATAR_BLOCK: BlockType = BlockType(64);

#[derive(Deserialize)]
struct AtlasConfig {
    #[serde(default)]
    tiles: BTreeMap<String, [u32; 6]>,
}
