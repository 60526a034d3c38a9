use tessera_geom::{Aabb, Vec3};

fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

fn vec3_approx_eq(a: Vec3, b: Vec3, eps: f32) -> bool {
    approx_eq(a.x, b.x, eps) && approx_eq(a.y, b.y, eps) && approx_eq(a.z, b.z, eps)
}

#[test]
fn vec3_add_sub_neg() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-4.0, 5.0, -6.0);
    let c = a + b;
    assert!(vec3_approx_eq(c, Vec3::new(-3.0, 7.0, -3.0), 1e-6));
    assert!(vec3_approx_eq(c - a, b, 1e-6));
    assert!(vec3_approx_eq(-a, Vec3::new(-1.0, -2.0, -3.0), 1e-6));
}

#[test]
fn vec3_dot_length_normalized() {
    let v = Vec3::new(3.0, 4.0, 0.0);
    assert!(approx_eq(v.dot(v), 25.0, 1e-6));
    assert!(approx_eq(v.length(), 5.0, 1e-6));
    assert!(vec3_approx_eq(v.normalized(), Vec3::new(0.6, 0.8, 0.0), 1e-6));

    // zero stays zero
    assert!(vec3_approx_eq(Vec3::ZERO.normalized(), Vec3::ZERO, 1e-6));
}

#[test]
fn vec3_cross_basis() {
    let i = Vec3::new(1.0, 0.0, 0.0);
    let j = Vec3::new(0.0, 1.0, 0.0);
    let k = Vec3::new(0.0, 0.0, 1.0);
    assert!(vec3_approx_eq(i.cross(j), k, 1e-6));
    assert!(vec3_approx_eq(j.cross(k), i, 1e-6));
    assert!(vec3_approx_eq(k.cross(i), j, 1e-6));
}

#[test]
fn vec3_lerp_endpoints_and_midpoint() {
    let a = Vec3::new(0.0, 10.0, -2.0);
    let b = Vec3::new(4.0, 20.0, 2.0);
    assert!(vec3_approx_eq(a.lerp(b, 0.0), a, 1e-6));
    assert!(vec3_approx_eq(a.lerp(b, 1.0), b, 1e-6));
    assert!(vec3_approx_eq(a.lerp(b, 0.5), Vec3::new(2.0, 15.0, 0.0), 1e-6));
}

#[test]
fn aabb_corners_cover_both_extremes() {
    let aabb = Aabb::new(Vec3::new(-1.0, 0.0, 1.0), Vec3::new(2.0, 3.0, 4.0));
    let corners = aabb.corners();
    assert!(vec3_approx_eq(corners[0], aabb.min, 1e-6));
    assert!(vec3_approx_eq(corners[7], aabb.max, 1e-6));
    for c in corners {
        assert!(aabb.contains(c));
    }
    // all eight distinct
    for i in 0..8 {
        for j in (i + 1)..8 {
            assert_ne!(corners[i], corners[j]);
        }
    }
}
