//! Which chunks to keep meshed and in what order to build them.

use tessera_geom::{Aabb, Frustum, Vec3};
use tessera_world::{CHUNK_WIDTH, ChunkCoord};

/// Height of the box used for culling; covers every generated block.
pub const CHUNK_HEIGHT: f32 = 256.0;

/// Chunks within `radius` (circular, inclusive) of `center`.
pub fn needed_set(center: ChunkCoord, radius: i32) -> Vec<ChunkCoord> {
    let r = radius.max(0);
    let mut out = Vec::new();
    for dx in -r..=r {
        for dz in -r..=r {
            if dx * dx + dz * dz <= r * r {
                out.push(center.offset(dx, dz));
            }
        }
    }
    out
}

#[inline]
pub fn is_needed(center: ChunkCoord, radius: i32, coord: ChunkCoord) -> bool {
    let r = i64::from(radius.max(0));
    coord.distance_sq(center) <= r * r
}

pub fn chunk_bounds(coord: ChunkCoord) -> Aabb {
    let (x0, z0) = coord.origin();
    let w = CHUNK_WIDTH as f32;
    let min = Vec3::new(x0 as f32, 0.0, z0 as f32);
    Aabb::new(min, min + Vec3::new(w, CHUNK_HEIGHT, w))
}

#[inline]
pub fn chunk_visible(frustum: &Frustum, coord: ChunkCoord) -> bool {
    frustum.intersects_aabb(&chunk_bounds(coord))
}

/// Visible chunks first, then nearest first, then by coordinate.
pub fn rank(coords: &mut [ChunkCoord], center: ChunkCoord, frustum: &Frustum) {
    coords.sort_by_cached_key(|&c| (!chunk_visible(frustum, c), c.distance_sq(center), c.cx, c.cz));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix4, Zero};

    #[test]
    fn radius_two_is_a_disc_of_thirteen() {
        let set = needed_set(ChunkCoord::new(0, 0), 2);
        assert_eq!(set.len(), 13);
        assert!(set.contains(&ChunkCoord::new(2, 0)));
        assert!(set.contains(&ChunkCoord::new(-1, -1)));
        assert!(!set.contains(&ChunkCoord::new(2, 1)));
        assert!(set.iter().all(|&c| is_needed(ChunkCoord::new(0, 0), 2, c)));
    }

    #[test]
    fn rank_orders_by_distance_when_all_visible() {
        // a frustum with no usable planes keeps everything
        let open = Frustum::from_matrix(&Matrix4::zero());
        let mut v = needed_set(ChunkCoord::new(5, 5), 1);
        rank(&mut v, ChunkCoord::new(5, 5), &open);
        assert_eq!(v[0], ChunkCoord::new(5, 5));
        assert_eq!(v[1], ChunkCoord::new(4, 5));
    }
}
