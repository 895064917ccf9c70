// Copyright @yucwang 2026

use crate::core::interaction::{SurfaceIntersection, SurfaceSampleRecord};
use crate::core::shape::Shape;
use crate::math::constants::{EPSILON, Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

/// The square [-1, 1]^2 in the local z = 0 plane, placed by `to_world`.
/// Its geometric normal is the transformed +z axis.
pub struct Rectangle {
    to_world: Transform,
    normal: Vector3f,
    area: Float,
    inv_area: Float,
}

impl Rectangle {
    pub fn new(to_world: Transform) -> Self {
        let dp_du = to_world.apply_vector(Vector3f::new(2.0, 0.0, 0.0));
        let dp_dv = to_world.apply_vector(Vector3f::new(0.0, 2.0, 0.0));
        let area = dp_du.cross(&dp_dv).norm();
        let inv_area = if area > 0.0 { 1.0 / area } else { 0.0 };
        let mut normal = dp_du.cross(&dp_dv);
        if normal.norm() > 0.0 {
            normal = normal.normalize();
        } else {
            normal = to_world.apply_normal(Vector3f::new(0.0, 0.0, 1.0));
            if normal.norm() > 0.0 {
                normal = normal.normalize();
            }
        }

        Self { to_world, normal, area, inv_area }
    }

    pub fn normal(&self) -> Vector3f {
        self.normal
    }

    fn intersect_local(&self, ray: &Ray3f) -> Option<(Float, Vector3f, Vector2f)> {
        let (origin, dir) = self.to_world.inv_apply_ray(ray);
        if dir.z.abs() < EPSILON * EPSILON {
            return None;
        }

        let t = -origin.z / dir.z;
        if !ray.test_segment(t) {
            return None;
        }
        let p_local = origin + dir * t;
        if p_local.x.abs() > 1.0 || p_local.y.abs() > 1.0 {
            return None;
        }

        let uv = Vector2f::new(0.5 * (p_local.x + 1.0), 0.5 * (p_local.y + 1.0));
        Some((t, p_local, uv))
    }
}

impl Shape for Rectangle {
    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let (t, _, uv) = self.intersect_local(ray)?;
        Some(SurfaceIntersection::new(ray.at(t), self.normal, uv, t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.intersect_local(ray).is_some()
    }

    fn sample(&self, u: &Vector2f) -> SurfaceSampleRecord {
        let p_local = Vector3f::new(2.0 * u.x - 1.0, 2.0 * u.y - 1.0, 0.0);
        let p_world = self.to_world.apply_point(p_local);
        let intersection = SurfaceIntersection::new(p_world, self.normal, *u, 0.0);
        SurfaceSampleRecord::new(intersection, self.inv_area)
    }

    fn surface_area(&self) -> Float {
        self.area
    }
}
