// Copyright @yucwang 2026

use crate::core::emitter::{Emitter, EmitterDirectionSample, EmitterPositionSample};
use crate::core::shape::Shape;
use crate::math::constants::{Float, PI, Vector2f, Vector3f};
use crate::math::frame::Frame;
use crate::math::spectrum::{RGBSpectrum, Spectrum};
use crate::math::warp::{sample_cosine_hemisphere, sample_cosine_hemisphere_pdf};
use std::sync::Arc;

/// Uniform one-sided emission from the front face of a shape.
pub struct AreaEmitter {
    shape: Arc<dyn Shape>,
    radiance: RGBSpectrum,
    object_index: usize,
}

impl AreaEmitter {
    pub fn from_shape(shape: Arc<dyn Shape>, radiance: RGBSpectrum, object_index: usize) -> Self {
        Self { shape, radiance, object_index }
    }

    pub fn radiance(&self) -> RGBSpectrum {
        self.radiance
    }
}

impl Emitter for AreaEmitter {
    fn is_delta_position(&self) -> bool {
        false
    }

    fn sample_position(&self, u: &Vector2f) -> EmitterPositionSample {
        let sample = self.shape.sample(u);
        EmitterPositionSample {
            p: sample.intersection().p(),
            normal: sample.intersection().geo_normal(),
            pdf: sample.pdf(),
        }
    }

    fn sample_direction(&self, u: &Vector2f, position: &EmitterPositionSample) -> EmitterDirectionSample {
        let local_dir = sample_cosine_hemisphere(u);
        let direction = Frame::from_normal(&position.normal).from_local(&local_dir);
        EmitterDirectionSample {
            direction,
            pdf: sample_cosine_hemisphere_pdf(local_dir.z),
        }
    }

    fn pdf_position(&self, _p: &Vector3f) -> Float {
        let area = self.shape.surface_area();
        if area > 0.0 {
            1.0 / area
        } else {
            0.0
        }
    }

    fn pdf_direction(&self, normal: &Vector3f, direction: &Vector3f) -> Float {
        let dir_len = direction.norm();
        if dir_len <= 0.0 {
            return 0.0;
        }
        sample_cosine_hemisphere_pdf(normal.dot(direction) / dir_len)
    }

    fn eval_position(&self) -> RGBSpectrum {
        self.radiance
    }

    fn eval_direction(&self, normal: &Vector3f, direction: &Vector3f) -> Float {
        if normal.dot(direction) > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    fn power(&self) -> Float {
        self.radiance.luminance() * self.shape.surface_area() * PI
    }

    fn object_index(&self) -> Option<usize> {
        Some(self.object_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::rectangle::Rectangle;
    use crate::math::transform::Transform;

    #[test]
    fn test_area_emitter_is_one_sided() {
        let shape = Arc::new(Rectangle::new(Transform::default()));
        let emitter = AreaEmitter::from_shape(shape, RGBSpectrum::new(2.0, 2.0, 2.0), 0);
        let n = Vector3f::new(0.0, 0.0, 1.0);
        assert_eq!(emitter.eval(&n, &Vector3f::new(0.0, 0.3, 1.0)), RGBSpectrum::new(2.0, 2.0, 2.0));
        assert_eq!(emitter.eval(&n, &Vector3f::new(0.0, 0.3, -1.0)), RGBSpectrum::zeros());
        assert!((emitter.pdf_position(&Vector3f::zeros()) - 0.25).abs() < 1e-6);

        let position = emitter.sample_position(&Vector2f::new(0.2, 0.9));
        let sample = emitter.sample_direction(&Vector2f::new(0.4, 0.1), &position);
        assert!(sample.direction.z > 0.0);
        assert!((sample.pdf - emitter.pdf_direction(&position.normal, &sample.direction)).abs() < 1e-5);
    }
}
