// Copyright @yucwang 2026

use crate::math::constants::Float;

pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Decorrelated generator for one (seed, pixel, sample) triple.
    pub fn for_sample(seed: u64, pixel_index: u64, sample_index: u64) -> Self {
        let mut h = mix64(seed ^ 0x9e37_79b9_7f4a_7c15);
        h = mix64(h ^ pixel_index);
        h = mix64(h ^ sample_index.wrapping_mul(0xd1b5_4a32_d192_ed03));
        Self { state: h }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }

    /// Uniform float in [0, 1).
    pub fn next_f32(&mut self) -> Float {
        (self.next_u32() >> 8) as Float * (1.0 / (1u32 << 24) as Float)
    }
}

// splitmix64 finalizer
fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_f32_in_unit_interval() {
        let mut rng = LcgRng::new(7);
        for _ in 0..10000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_for_sample_is_deterministic() {
        let mut a = LcgRng::for_sample(3, 17, 5);
        let mut b = LcgRng::for_sample(3, 17, 5);
        let mut c = LcgRng::for_sample(3, 17, 6);
        let va: Vec<u32> = (0..4).map(|_| a.next_u32()).collect();
        let vb: Vec<u32> = (0..4).map(|_| b.next_u32()).collect();
        let vc: Vec<u32> = (0..4).map(|_| c.next_u32()).collect();
        assert_eq!(va, vb);
        assert_ne!(va, vc);
    }
}
