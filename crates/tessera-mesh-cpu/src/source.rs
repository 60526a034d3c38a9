use tessera_blocks::BlockType;
use tessera_chunk::ChunkStore;
use tessera_world::{BlockCoord, BlockMap};

/// Read access to neighbouring blocks while meshing.
pub trait BlockSource: Sync {
    fn block(&self, b: BlockCoord) -> BlockType;
}

/// Only resident chunks are consulted; an unloaded neighbour reads as `UNKNOWN`, which is
/// transparent, so border faces stay visible until the neighbour arrives.
impl BlockSource for ChunkStore {
    #[inline]
    fn block(&self, b: BlockCoord) -> BlockType {
        self.resident_block(b)
    }
}

impl BlockSource for BlockMap {
    #[inline]
    fn block(&self, b: BlockCoord) -> BlockType {
        self.get(&b).copied().unwrap_or(BlockType::AIR)
    }
}
