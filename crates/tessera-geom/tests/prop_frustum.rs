use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3, perspective};
use proptest::prelude::*;
use tessera_geom::{Aabb, Frustum, Vec3};

fn camera_at_origin_looking_down_neg_z() -> Frustum {
    let proj = perspective(Deg(60.0f32), 1.0, 0.1, 500.0);
    let view = Matrix4::look_at_rh(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, -1.0),
        Vector3::unit_y(),
    );
    Frustum::from_matrix(&(proj * view))
}

#[test]
fn box_strictly_inside_clip_cube_is_visible() {
    let f = Frustum::from_matrix(&Matrix4::identity());
    let b = Aabb::new(Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
    assert!(f.intersects_aabb(&b));
}

#[test]
fn box_far_outside_clip_cube_is_not_visible() {
    let f = Frustum::from_matrix(&Matrix4::identity());
    let b = Aabb::new(Vec3::new(100.0, -0.5, -0.5), Vec3::new(101.0, 0.5, 0.5));
    assert!(!f.intersects_aabb(&b));
}

#[test]
fn perspective_keeps_front_and_drops_behind() {
    let f = camera_at_origin_looking_down_neg_z();
    let ahead = Aabb::new(Vec3::new(-4.0, -4.0, -40.0), Vec3::new(4.0, 4.0, -32.0));
    let behind = Aabb::new(Vec3::new(-4.0, -4.0, 32.0), Vec3::new(4.0, 4.0, 40.0));
    let beyond_far = Aabb::new(Vec3::new(-4.0, -4.0, -900.0), Vec3::new(4.0, 4.0, -800.0));
    assert!(f.intersects_aabb(&ahead));
    assert!(!f.intersects_aabb(&behind));
    assert!(!f.intersects_aabb(&beyond_far));
}

proptest! {
    #[test]
    fn box_containing_a_visible_point_is_visible(
        x in -0.9f32..0.9,
        y in -0.9f32..0.9,
        z in -0.9f32..0.9,
        half in 0.0f32..5.0,
    ) {
        let f = Frustum::from_matrix(&Matrix4::identity());
        let p = Vec3::new(x, y, z);
        let b = Aabb::new(p - Vec3::new(half, half, half), p + Vec3::new(half, half, half));
        prop_assert!(f.intersects_aabb(&b));
    }

    #[test]
    fn translated_far_away_is_culled(offset in 3.0f32..1.0e4, axis in 0usize..3, sign in prop::bool::ANY) {
        let f = Frustum::from_matrix(&Matrix4::identity());
        let s = if sign { 1.0 } else { -1.0 };
        let mut d = Vec3::ZERO;
        match axis {
            0 => d.x = offset * s,
            1 => d.y = offset * s,
            _ => d.z = offset * s,
        }
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0) + d, Vec3::new(1.0, 1.0, 1.0) + d);
        prop_assert!(!f.intersects_aabb(&b));
    }
}
