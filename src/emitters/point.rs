// Copyright @yucwang 2026

use crate::core::emitter::{Emitter, EmitterDirectionSample, EmitterPositionSample};
use crate::math::constants::{Float, PI, Vector2f, Vector3f};
use crate::math::spectrum::{RGBSpectrum, Spectrum};
use crate::math::warp::{sample_uniform_sphere, sample_uniform_sphere_pdf};

/// Isotropic point light; `intensity` is radiant intensity (power per
/// steradian).
pub struct PointEmitter {
    position: Vector3f,
    intensity: RGBSpectrum,
}

impl PointEmitter {
    pub fn new(position: Vector3f, intensity: RGBSpectrum) -> Self {
        Self { position, intensity }
    }
}

impl Emitter for PointEmitter {
    fn is_delta_position(&self) -> bool {
        true
    }

    fn sample_position(&self, _u: &Vector2f) -> EmitterPositionSample {
        EmitterPositionSample {
            p: self.position,
            normal: Vector3f::zeros(),
            pdf: 1.0,
        }
    }

    fn sample_direction(&self, u: &Vector2f, _position: &EmitterPositionSample) -> EmitterDirectionSample {
        EmitterDirectionSample {
            direction: sample_uniform_sphere(u),
            pdf: sample_uniform_sphere_pdf(),
        }
    }

    fn pdf_position(&self, _p: &Vector3f) -> Float {
        1.0
    }

    fn pdf_direction(&self, _normal: &Vector3f, _direction: &Vector3f) -> Float {
        sample_uniform_sphere_pdf()
    }

    fn eval_position(&self) -> RGBSpectrum {
        self.intensity
    }

    fn eval_direction(&self, _normal: &Vector3f, _direction: &Vector3f) -> Float {
        1.0
    }

    fn power(&self) -> Float {
        4.0 * PI * self.intensity.luminance()
    }
}
