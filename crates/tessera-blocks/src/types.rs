use serde::{Deserialize, Serialize};

/// Numeric block id. `0` is air, `-1` marks a cell whose chunk is not loaded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockType(pub i32);

impl BlockType {
    pub const UNKNOWN: BlockType = BlockType(-1);
    pub const AIR: BlockType = BlockType(0);
    pub const GRASS: BlockType = BlockType(1);
    pub const SAND: BlockType = BlockType(2);
    pub const WOOD: BlockType = BlockType(5);
    pub const GLASS: BlockType = BlockType(10);
    pub const LEAVES: BlockType = BlockType(15);
    pub const CLOUD: BlockType = BlockType(16);
    pub const TALL_GRASS: BlockType = BlockType(17);
    pub const FLOWER_FIRST: BlockType = BlockType(18);
    pub const FLOWER_LAST: BlockType = BlockType(24);

    const PLANT_MIN: i32 = 17;
    const PLANT_MAX: i32 = 31;

    #[inline]
    pub const fn id(self) -> i32 {
        self.0
    }

    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == 0
    }

    /// Rendered as a crossed pair of quads rather than a cube.
    #[inline]
    pub const fn is_plant(self) -> bool {
        self.0 >= Self::PLANT_MIN && self.0 <= Self::PLANT_MAX
    }

    /// Faces next to a transparent block stay visible.
    #[inline]
    pub const fn is_transparent(self) -> bool {
        if self.is_plant() {
            return true;
        }
        matches!(self.0, -1 | 0 | 10 | 15)
    }

    /// Blocks movement. Unknown cells count as solid so nothing falls into unloaded terrain.
    #[inline]
    pub const fn is_obstacle(self) -> bool {
        !self.is_plant() && self.0 != 0
    }
}

impl From<i32> for BlockType {
    #[inline]
    fn from(v: i32) -> Self {
        BlockType(v)
    }
}

impl From<BlockType> for i32 {
    #[inline]
    fn from(b: BlockType) -> Self {
        b.0
    }
}
