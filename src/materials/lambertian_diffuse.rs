// Copyright @yucwang 2023

use crate::core::bsdf::{BSDFSampleRecord, BSDFValue, BSDF};
use crate::math::constants::{ Float, INV_PI, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{ sample_cosine_hemisphere, sample_cosine_hemisphere_pdf };

/// Two-sided Lambertian reflector.
pub struct LambertianDiffuseBSDF {
    color: RGBSpectrum
}

impl BSDF for LambertianDiffuseBSDF {
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> BSDFValue {
        if wo.z * wi.z <= 0.0 {
            return BSDFValue::zeros();
        }
        self.color * INV_PI
    }

    fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float {
        if wo.z * wi.z <= 0.0 {
            return 0.0;
        }
        sample_cosine_hemisphere_pdf(wi.z.abs())
    }

    fn sample(&self, u: &Vector2f, wo: &Vector3f) -> Option<BSDFSampleRecord> {
        if wo.z == 0.0 {
            return None;
        }
        let mut wi = sample_cosine_hemisphere(u);
        if wo.z < 0.0 {
            wi.z *= -1.0;
        }
        let pdf = sample_cosine_hemisphere_pdf(wi.z.abs());
        if pdf <= 0.0 {
            return None;
        }

        Some(BSDFSampleRecord {
            wi,
            value: self.color * INV_PI,
            pdf,
            delta: false,
        })
    }
}

impl LambertianDiffuseBSDF {
    pub fn new(rgb: RGBSpectrum) -> Self {
        Self {
            color: rgb,
        }
    }

    pub fn reflectance(&self) -> RGBSpectrum {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_on_outgoing_side() {
        let bsdf = LambertianDiffuseBSDF::new(RGBSpectrum::new(0.5, 0.5, 0.5));
        let wo = Vector3f::new(0.0, 0.6, -0.8);
        let record = bsdf.sample(&Vector2f::new(0.3, 0.7), &wo).expect("sample");
        assert!(record.wi.z < 0.0);
        assert!((record.pdf - bsdf.pdf(&wo, &record.wi)).abs() < 1e-6);
        assert!((record.value - bsdf.eval(&wo, &record.wi)).norm() < 1e-6);
    }

    #[test]
    fn test_no_transmission() {
        let bsdf = LambertianDiffuseBSDF::new(RGBSpectrum::new(1.0, 1.0, 1.0));
        let wo = Vector3f::new(0.0, 0.0, 1.0);
        let wi = Vector3f::new(0.0, 0.0, -1.0);
        assert_eq!(bsdf.eval(&wo, &wi), BSDFValue::zeros());
        assert_eq!(bsdf.pdf(&wo, &wi), 0.0);
    }
}
