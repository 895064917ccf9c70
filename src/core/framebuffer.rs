// Copyright @yucwang 2026

//! Lock-free per-pixel radiance accumulation.
//!
//! Every worker thread may add into any pixel at any time: the sampled pixel
//! receives its own estimate together with a sample count, while light
//! tracing splats energy into arbitrary pixels without touching the count.
//! Sums are kept in `f64` to keep long progressive renders from drifting.

use crate::math::constants::{Float, Vector3f};
use std::sync::atomic::{AtomicU64, Ordering};

#[repr(align(64))]
#[derive(Default)]
struct PixelAccumulator {
    sum: [AtomicU64; 3],
    count: AtomicU64,
}

impl PixelAccumulator {
    fn add(&self, rgb: &Vector3f, count: u64) {
        for c in 0..3 {
            atomic_add_f64(&self.sum[c], rgb[c] as f64);
        }
        if count > 0 {
            self.count.fetch_add(count, Ordering::Relaxed);
        }
    }
}

fn atomic_add_f64(cell: &AtomicU64, value: f64) {
    if value == 0.0 {
        return;
    }
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + value).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Raw accumulator state of one pixel, used for checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelState {
    pub sum: [f64; 3],
    pub count: u64,
}

pub struct AtomicFramebuffer {
    width: usize,
    height: usize,
    pixels: Vec<PixelAccumulator>,
}

impl AtomicFramebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        pixels.resize_with(width * height, PixelAccumulator::default);
        Self { width, height, pixels }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn accumulator(&self, x: usize, y: usize) -> Option<&PixelAccumulator> {
        if x < self.width && y < self.height {
            self.pixels.get(x + self.width * y)
        } else {
            None
        }
    }

    /// Adds the estimate of one sample taken in pixel (x, y).
    pub fn add_sample(&self, x: usize, y: usize, rgb: &Vector3f) {
        if let Some(pixel) = self.accumulator(x, y) {
            pixel.add(rgb, 1);
        }
    }

    /// Adds energy landing in (x, y) without counting a sample there.
    /// Splats outside the image are dropped.
    pub fn splat(&self, x: usize, y: usize, rgb: &Vector3f) {
        if let Some(pixel) = self.accumulator(x, y) {
            pixel.add(rgb, 0);
        }
    }

    pub fn sample_count(&self, x: usize, y: usize) -> u64 {
        self.accumulator(x, y)
            .map(|p| p.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Current estimate: accumulated sum over the pixel's sample count.
    pub fn pixel(&self, x: usize, y: usize) -> Vector3f {
        let state = match self.accumulator(x, y) {
            Some(pixel) => load_state(pixel),
            None => return Vector3f::zeros(),
        };
        if state.count == 0 {
            return Vector3f::zeros();
        }
        let inv = 1.0 / state.count as f64;
        Vector3f::new(
            (state.sum[0] * inv) as Float,
            (state.sum[1] * inv) as Float,
            (state.sum[2] * inv) as Float,
        )
    }

    /// Row-major estimates of the whole image.
    pub fn resolve(&self) -> Vec<Vector3f> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.pixel(x, y));
            }
        }
        out
    }

    pub fn snapshot(&self) -> Vec<PixelState> {
        self.pixels.iter().map(load_state).collect()
    }

    /// Replaces every accumulator; `states` must cover the whole image.
    pub fn restore(&self, states: &[PixelState]) -> bool {
        if states.len() != self.pixels.len() {
            return false;
        }
        for (pixel, state) in self.pixels.iter().zip(states) {
            for c in 0..3 {
                pixel.sum[c].store(state.sum[c].to_bits(), Ordering::Relaxed);
            }
            pixel.count.store(state.count, Ordering::Relaxed);
        }
        true
    }

    pub fn reset(&self) {
        for pixel in &self.pixels {
            for c in 0..3 {
                pixel.sum[c].store(0f64.to_bits(), Ordering::Relaxed);
            }
            pixel.count.store(0, Ordering::Relaxed);
        }
    }
}

fn load_state(pixel: &PixelAccumulator) -> PixelState {
    PixelState {
        sum: [
            f64::from_bits(pixel.sum[0].load(Ordering::Relaxed)),
            f64::from_bits(pixel.sum[1].load(Ordering::Relaxed)),
            f64::from_bits(pixel.sum[2].load(Ordering::Relaxed)),
        ],
        count: pixel.count.load(Ordering::Relaxed),
    }
}
