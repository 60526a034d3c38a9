use cgmath::{Deg, Matrix4, Point3, Vector3, perspective};
use proptest::prelude::*;
use tessera_geom::Frustum;
use tessera_runtime::visibility::{chunk_visible, is_needed, needed_set, rank};
use tessera_world::ChunkCoord;

fn looking_along_x() -> Frustum {
    let view = Matrix4::look_at_rh(
        Point3::new(16.0, 100.0, 16.0),
        Point3::new(116.0, 60.0, 16.0),
        Vector3::unit_y(),
    );
    Frustum::from_matrix(&(perspective(Deg(60.0f32), 1.0, 0.1, 1000.0) * view))
}

proptest! {
    #[test]
    fn needed_set_is_exactly_the_disc(cx in -1000i32..1000, cz in -1000i32..1000, r in 0i32..7) {
        let center = ChunkCoord::new(cx, cz);
        let set = needed_set(center, r);
        for dx in -r - 1..=r + 1 {
            for dz in -r - 1..=r + 1 {
                let c = center.offset(dx, dz);
                let inside = dx * dx + dz * dz <= r * r;
                prop_assert_eq!(set.contains(&c), inside);
                prop_assert_eq!(is_needed(center, r, c), inside);
            }
        }
    }

    #[test]
    fn ranking_puts_visible_first_then_nearest(r in 1i32..6) {
        let center = ChunkCoord::new(0, 0);
        let frustum = looking_along_x();
        let mut coords = needed_set(center, r);
        rank(&mut coords, center, &frustum);
        let key = |c: &ChunkCoord| (!chunk_visible(&frustum, *c), c.distance_sq(center));
        for pair in coords.windows(2) {
            prop_assert!(key(&pair[0]) <= key(&pair[1]));
        }
    }
}

#[test]
fn chunks_behind_the_camera_are_culled() {
    let f = looking_along_x();
    assert!(chunk_visible(&f, ChunkCoord::new(2, 0)));
    assert!(!chunk_visible(&f, ChunkCoord::new(-3, 0)));
}
