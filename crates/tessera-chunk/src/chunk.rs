use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_blocks::BlockType;
use tessera_world::{BlockCoord, BlockMap, ChunkCoord, Version, fatal_invariant};

/// Blocks of one 32x32 column footprint. Air is never stored.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    blocks: RwLock<BlockMap>,
    version: AtomicU64,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, blocks: BlockMap, version: Version) -> Self {
        for b in blocks.keys() {
            fatal_invariant!(
                b.chunk() == coord,
                "block {b:?} stored in chunk {coord:?}"
            );
        }
        Self {
            coord,
            blocks: RwLock::new(blocks),
            version: AtomicU64::new(version.get()),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    #[inline]
    pub fn version(&self) -> Version {
        Version(self.version.load(Ordering::Acquire))
    }

    /// Raises the version to `v`; never lowers it.
    pub fn bump(&self, v: Version) {
        self.version.fetch_max(v.get(), Ordering::AcqRel);
    }

    /// The stored type, or air when nothing is stored.
    pub fn get(&self, b: BlockCoord) -> BlockType {
        self.check(b);
        self.blocks
            .read()
            .unwrap()
            .get(&b)
            .copied()
            .unwrap_or(BlockType::AIR)
    }

    /// Stores `w` at `b` (air removes). Returns whether the stored value changed.
    pub fn set(&self, b: BlockCoord, w: BlockType) -> bool {
        self.check(b);
        let mut blocks = self.blocks.write().unwrap();
        if w.is_air() {
            blocks.remove(&b).is_some()
        } else {
            blocks.insert(b, w) != Some(w)
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored block. Callers iterate the copy so no lock is held while they
    /// query other chunks.
    pub fn snapshot(&self) -> Vec<(BlockCoord, BlockType)> {
        self.blocks
            .read()
            .unwrap()
            .iter()
            .map(|(b, w)| (*b, *w))
            .collect()
    }

    fn check(&self, b: BlockCoord) {
        fatal_invariant!(
            b.chunk() == self.coord,
            "block {b:?} addressed through chunk {:?}",
            self.coord
        );
    }
}
