// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Matrix4f, Vector3f };
use super::ray::Ray3f;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or(Matrix4f::identity())}
    }

    pub fn translate(t: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&t))
    }

    pub fn scale(s: Vector3f) -> Self {
        Self::new(Matrix4f::new_nonuniform_scaling(&s))
    }

    pub fn rotate(axis: Vector3f, angle_deg: Float) -> Self {
        let axis = if axis.norm() > 0.0 { axis.normalize() } else { Vector3f::new(0.0, 0.0, 1.0) };
        Self::new(Matrix4f::new_rotation(axis * angle_deg.to_radians()))
    }

    /// `self` applied after `inner`.
    pub fn compose(&self, inner: &Transform) -> Self {
        Self::new(self.matrix * inner.matrix)
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        let h = self.matrix * p.push(1.0);
        Vector3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.matrix * v.push(0.0)).xyz()
    }

    // Normals transform with the inverse transpose: (M^{-1})^T n.
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        (self.inv_matrix.transpose() * n.push(0.0)).xyz()
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        let h = self.inv_matrix * p.push(1.0);
        Vector3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.inv_matrix * v.push(0.0)).xyz()
    }

    // Local direction is not renormalized, so local t equals world t.
    pub fn inv_apply_ray(&self, ray: &Ray3f) -> (Vector3f, Vector3f) {
        (self.inv_apply_point(ray.origin()), self.inv_apply_vector(ray.dir()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_point_round_trip() {
        let t = Transform::translate(Vector3f::new(1.0, 2.0, 3.0))
            .compose(&Transform::rotate(Vector3f::new(0.0, 1.0, 0.0), 30.0))
            .compose(&Transform::scale(Vector3f::new(2.0, 2.0, 2.0)));
        let p = Vector3f::new(0.5, -0.25, 1.0);
        let q = t.inv_apply_point(t.apply_point(p));
        assert!((p - q).norm() < 1e-5);
    }

    #[test]
    fn test_normal_stays_perpendicular() {
        let t = Transform::scale(Vector3f::new(4.0, 1.0, 1.0));
        let tangent = t.apply_vector(Vector3f::new(1.0, 1.0, 0.0));
        let normal = t.apply_normal(Vector3f::new(1.0, -1.0, 0.0));
        assert!(tangent.dot(&normal).abs() < 1e-5);
    }
}
