use cgmath::{Matrix, Matrix4, Vector4};

use crate::{Aabb, Vec3};

/// Plane `a*x + b*y + c*z + d = 0`; points with a non-negative value are on the inner side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Plane {
    fn from_row(v: Vector4<f32>) -> Self {
        Self {
            a: v.x,
            b: v.y,
            c: v.z,
            d: v.w,
        }
    }

    #[inline]
    pub fn signed(&self, p: Vec3) -> f32 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }
}

/// Six clip planes in the order left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes from a combined projection * view matrix.
    pub fn from_matrix(m: &Matrix4<f32>) -> Self {
        let r1 = m.row(0);
        let r2 = m.row(1);
        let r3 = m.row(2);
        let r4 = m.row(3);
        Self {
            planes: [
                Plane::from_row(r4 + r1),
                Plane::from_row(r4 - r1),
                Plane::from_row(r4 + r2),
                Plane::from_row(r4 - r2),
                Plane::from_row(r4 + r3),
                Plane::from_row(r4 - r3),
            ],
        }
    }

    /// Conservative box test: a box is rejected only when all eight corners fall
    /// behind a single plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let corners = aabb.corners();
        self.planes
            .iter()
            .all(|plane| corners.iter().any(|&c| plane.signed(c) >= 0.0))
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed(p) >= 0.0)
    }
}
