// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;

/// Point sampled on an emitter. `normal` is zero for emitters without a
/// surface, and `pdf` is then the discrete probability of the position.
#[derive(Debug, Clone, Copy)]
pub struct EmitterPositionSample {
    pub p: Vector3f,
    pub normal: Vector3f,
    pub pdf: Float,
}

/// Direction leaving an emitter position, with its solid angle density.
#[derive(Debug, Clone, Copy)]
pub struct EmitterDirectionSample {
    pub direction: Vector3f,
    pub pdf: Float,
}

/// Emission is factored into a positional term (radiance or intensity) and a
/// directional factor, so that light subpaths can start from the position
/// alone and pick up the angular part on their first bounce.
pub trait Emitter: Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    fn is_delta_position(&self) -> bool;
    fn sample_position(&self, u: &Vector2f) -> EmitterPositionSample;
    fn sample_direction(&self, u: &Vector2f, position: &EmitterPositionSample) -> EmitterDirectionSample;
    fn pdf_position(&self, p: &Vector3f) -> Float;
    fn pdf_direction(&self, normal: &Vector3f, direction: &Vector3f) -> Float;
    fn eval_position(&self) -> RGBSpectrum;
    fn eval_direction(&self, normal: &Vector3f, direction: &Vector3f) -> Float;
    /// Total emitted power, used to build the light selection distribution.
    fn power(&self) -> Float;

    /// Emitted radiance leaving the emitter along `direction`.
    fn eval(&self, normal: &Vector3f, direction: &Vector3f) -> RGBSpectrum {
        self.eval_position() * self.eval_direction(normal, direction)
    }

    /// Object index of the shape this emitter is attached to, if any.
    fn object_index(&self) -> Option<usize> {
        None
    }
}
