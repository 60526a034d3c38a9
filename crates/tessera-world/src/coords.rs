use serde::{Deserialize, Serialize};

/// Columns per chunk along x and z. Height is not chunked.
pub const CHUNK_WIDTH: i32 = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockCoord {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a world-space position (block centers sit on integers).
    #[inline]
    pub fn nearest(x: f32, y: f32, z: f32) -> Self {
        Self::new(x.round() as i32, y.round() as i32, z.round() as i32)
    }

    #[inline]
    pub fn chunk(self) -> ChunkCoord {
        ChunkCoord::new(
            self.x.div_euclid(CHUNK_WIDTH),
            self.z.div_euclid(CHUNK_WIDTH),
        )
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    #[inline]
    pub fn left(self) -> Self {
        self.offset(-1, 0, 0)
    }
    #[inline]
    pub fn right(self) -> Self {
        self.offset(1, 0, 0)
    }
    #[inline]
    pub fn up(self) -> Self {
        self.offset(0, 1, 0)
    }
    #[inline]
    pub fn down(self) -> Self {
        self.offset(0, -1, 0)
    }
    #[inline]
    pub fn front(self) -> Self {
        self.offset(0, 0, 1)
    }
    #[inline]
    pub fn back(self) -> Self {
        self.offset(0, 0, -1)
    }

    /// Face neighbours in the order left, right, up, down, front, back.
    #[inline]
    pub fn neighbors(self) -> [BlockCoord; 6] {
        [
            self.left(),
            self.right(),
            self.up(),
            self.down(),
            self.front(),
            self.back(),
        ]
    }

    /// Chunks other than our own that share a face with this block.
    pub fn border_chunks(self) -> impl Iterator<Item = ChunkCoord> {
        let own = self.chunk();
        let mut out: [Option<ChunkCoord>; 4] = [None; 4];
        for (slot, n) in out
            .iter_mut()
            .zip([self.left(), self.right(), self.front(), self.back()])
        {
            let c = n.chunk();
            if c != own {
                *slot = Some(c);
            }
        }
        out.into_iter().flatten()
    }
}

impl From<(i32, i32, i32)> for BlockCoord {
    fn from(v: (i32, i32, i32)) -> Self {
        Self::new(v.0, v.1, v.2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.cx + dx, self.cz + dz)
    }

    /// Squared planar distance in chunk units.
    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dz * dz
    }

    /// World x/z of the first column.
    #[inline]
    pub fn origin(self) -> (i32, i32) {
        (self.cx * CHUNK_WIDTH, self.cz * CHUNK_WIDTH)
    }

    #[inline]
    pub fn contains(self, b: BlockCoord) -> bool {
        b.chunk() == self
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(v: (i32, i32)) -> Self {
        Self::new(v.0, v.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(v: ChunkCoord) -> Self {
        (v.cx, v.cz)
    }
}
