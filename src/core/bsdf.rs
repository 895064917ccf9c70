// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector2f, Vector3f };
use crate::math::spectrum::RGBSpectrum;

// Every direction handed to a BSDF is expressed in the local shading frame
// (z along the surface normal) and points away from the surface.
pub type BSDFValue = RGBSpectrum;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BSDFSampleRecord {
    pub wi: Vector3f,
    pub value: BSDFValue,
    pub pdf: Float,
    pub delta: bool,
}

pub trait BSDF: Send + Sync {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
    fn eval(&self, wo: &Vector3f, wi: &Vector3f) -> BSDFValue;
    /// Solid angle density of sampling `wi` given `wo`.
    fn pdf(&self, wo: &Vector3f, wi: &Vector3f) -> Float;
    fn sample(&self, u: &Vector2f, wo: &Vector3f) -> Option<BSDFSampleRecord>;
}

impl Default for BSDFSampleRecord {
    fn default() -> Self {
        Self {
            wi: Vector3f::zeros(),
            value: BSDFValue::zeros(),
            pdf: 0.0,
            delta: false,
        }
    }
}
