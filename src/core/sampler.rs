// Copyright @yucwang 2026

use crate::core::rng::LcgRng;
use crate::math::constants::{Float, Vector2f};

/// Source of the random numbers consumed by one pixel sample.
pub trait SampleGenerator {
    /// Restart the sequence for `sample_index` of pixel `pixel_index`.
    fn start_path(&mut self, pixel_index: u64, sample_index: u64);
    fn next_1d(&mut self) -> Float;
    fn next_2d(&mut self) -> Vector2f {
        let u = self.next_1d();
        let v = self.next_1d();
        Vector2f::new(u, v)
    }
}

/// Pseudo-random generator reseeded per (pixel, sample), so any sample can be
/// regenerated independently of the order in which samples are taken.
pub struct UniformSampleGenerator {
    seed: u64,
    rng: LcgRng,
}

impl UniformSampleGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed, rng: LcgRng::for_sample(seed, 0, 0) }
    }
}

impl SampleGenerator for UniformSampleGenerator {
    fn start_path(&mut self, pixel_index: u64, sample_index: u64) {
        self.rng = LcgRng::for_sample(self.seed, pixel_index, sample_index);
    }

    fn next_1d(&mut self) -> Float {
        self.rng.next_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restart_reproduces_sequence() {
        let mut sampler = UniformSampleGenerator::new(11);
        sampler.start_path(4, 9);
        let first: Vec<Float> = (0..6).map(|_| sampler.next_1d()).collect();
        sampler.start_path(5, 0);
        sampler.next_2d();
        sampler.start_path(4, 9);
        let second: Vec<Float> = (0..6).map(|_| sampler.next_1d()).collect();
        assert_eq!(first, second);
    }
}
