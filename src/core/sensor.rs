// Copyright @yucwang 2026

use crate::core::framebuffer::AtomicFramebuffer;
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;

/// Result of projecting a world point onto the sensor.
#[derive(Debug, Clone, Copy)]
pub struct SensorProjection {
    pub raster: Vector2f,
    /// Unit direction from the sensor origin towards the point.
    pub direction: Vector3f,
    pub distance: Float,
    pub importance: Float,
}

pub trait Sensor: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn position(&self) -> Vector3f;
    fn forward(&self) -> Vector3f;
    /// Primary ray through `raster` (pixel units, origin at the top-left).
    fn sample_ray(&self, raster: &Vector2f) -> Ray3f;
    /// Importance emitted along `direction`; zero outside the image.
    fn importance(&self, direction: &Vector3f) -> Float;
    /// Solid angle density with which `sample_ray` produces `direction`
    /// when the raster position is uniform over the whole image.
    fn pdf_direction(&self, direction: &Vector3f) -> Float;
    fn project(&self, p: &Vector3f) -> Option<SensorProjection>;
    fn film(&self) -> &AtomicFramebuffer;
    fn describe(&self) -> String {
        String::from("Sensor")
    }
}
