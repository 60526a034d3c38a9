use tessera_geom::Vec3;
use tessera_world::BlockCoord;

/// Cube faces, numbered in the order every `show` mask uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    Left = 0,
    Right = 1,
    Up = 2,
    Down = 3,
    Front = 4,
    Back = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Left,
        Face::Right,
        Face::Up,
        Face::Down,
        Face::Front,
        Face::Back,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Out-of-range indices map to `Left`.
    #[inline]
    pub fn from_index(i: usize) -> Face {
        Face::ALL.get(i).copied().unwrap_or(Face::Left)
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (dx, dy, dz) = self.delta();
        Vec3::new(dx as f32, dy as f32, dz as f32)
    }

    /// Grid step out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Left => (-1, 0, 0),
            Face::Right => (1, 0, 0),
            Face::Up => (0, 1, 0),
            Face::Down => (0, -1, 0),
            Face::Front => (0, 0, 1),
            Face::Back => (0, 0, -1),
        }
    }

    #[inline]
    pub fn neighbor(self, b: BlockCoord) -> BlockCoord {
        let (dx, dy, dz) = self.delta();
        b.offset(dx, dy, dz)
    }
}
