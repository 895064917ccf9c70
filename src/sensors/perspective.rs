// Copyright @yucwang 2026

use crate::core::framebuffer::AtomicFramebuffer;
use crate::core::sensor::{Sensor, SensorProjection};
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

/// Pinhole camera. The image plane sits at unit distance along `forward`;
/// importance is normalized over the whole image so that a camera sample
/// carries unit weight.
pub struct PerspectiveCamera {
    origin: Vector3f,
    forward: Vector3f,
    right: Vector3f,
    up: Vector3f,
    tan_half_fov_y: Float,
    aspect: Float,
    plane_area: Float,
    film: AtomicFramebuffer,
}

impl PerspectiveCamera {
    pub fn new(origin: Vector3f,
               target: Vector3f,
               up: Vector3f,
               fov_y_radians: Float,
               width: usize,
               height: usize) -> Self {
        let forward = (target - origin).normalize();
        let right = forward.cross(&up).normalize();
        let up = right.cross(&forward).normalize();
        let tan_half_fov_y = (0.5 * fov_y_radians).tan();
        let aspect = if height > 0 { width as Float / height as Float } else { 1.0 };

        Self {
            origin,
            forward,
            right,
            up,
            tan_half_fov_y,
            aspect,
            plane_area: 4.0 * aspect * tan_half_fov_y * tan_half_fov_y,
            film: AtomicFramebuffer::new(width, height),
        }
    }

    /// Image plane coordinates of a camera space direction, or `None` when it
    /// falls outside the image.
    fn plane_coordinates(&self, direction: &Vector3f) -> Option<(Float, Float, Float)> {
        let cos_theta = direction.dot(&self.forward);
        if cos_theta <= 0.0 {
            return None;
        }
        let px = direction.dot(&self.right) / cos_theta;
        let py = direction.dot(&self.up) / cos_theta;
        let half_w = self.aspect * self.tan_half_fov_y;
        if px.abs() > half_w || py.abs() > self.tan_half_fov_y {
            return None;
        }
        Some((px, py, cos_theta))
    }
}

impl Sensor for PerspectiveCamera {
    fn width(&self) -> usize {
        self.film.width()
    }

    fn height(&self) -> usize {
        self.film.height()
    }

    fn position(&self) -> Vector3f {
        self.origin
    }

    fn forward(&self) -> Vector3f {
        self.forward
    }

    fn sample_ray(&self, raster: &Vector2f) -> Ray3f {
        let u = raster.x / self.width().max(1) as Float;
        let v = raster.y / self.height().max(1) as Float;
        let px = (2.0 * u - 1.0) * self.aspect * self.tan_half_fov_y;
        let py = (1.0 - 2.0 * v) * self.tan_half_fov_y;

        let dir = self.right * px + self.up * py + self.forward;
        Ray3f::new(self.origin, dir, Some(0.0), None)
    }

    fn importance(&self, direction: &Vector3f) -> Float {
        match self.plane_coordinates(direction) {
            Some((_, _, cos_theta)) if self.plane_area > 0.0 => {
                let cos2 = cos_theta * cos_theta;
                1.0 / (self.plane_area * cos2 * cos2)
            }
            _ => 0.0,
        }
    }

    fn pdf_direction(&self, direction: &Vector3f) -> Float {
        match self.plane_coordinates(direction) {
            Some((_, _, cos_theta)) if self.plane_area > 0.0 => {
                1.0 / (self.plane_area * cos_theta * cos_theta * cos_theta)
            }
            _ => 0.0,
        }
    }

    fn project(&self, p: &Vector3f) -> Option<SensorProjection> {
        let to_point = p - self.origin;
        let distance = to_point.norm();
        if distance <= 0.0 {
            return None;
        }
        let direction = to_point / distance;
        let (px, py, _) = self.plane_coordinates(&direction)?;
        let u = 0.5 * (px / (self.aspect * self.tan_half_fov_y) + 1.0);
        let v = 0.5 * (1.0 - py / self.tan_half_fov_y);
        let raster = Vector2f::new(u * self.width() as Float, v * self.height() as Float);
        if raster.x < 0.0 || raster.y < 0.0
            || raster.x >= self.width() as Float || raster.y >= self.height() as Float {
            return None;
        }

        Some(SensorProjection {
            raster,
            direction,
            distance,
            importance: self.importance(&direction),
        })
    }

    fn film(&self) -> &AtomicFramebuffer {
        &self.film
    }

    fn describe(&self) -> String {
        format!("PerspectiveCamera {}x{} at {:?}", self.width(), self.height(), self.origin)
    }
}
