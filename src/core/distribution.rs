// Copyright @yucwang 2026

use crate::math::constants::Float;

/// Discrete distribution over a fixed set of weights, sampled by inverting a
/// normalized CDF. Built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct Distribution1D {
    pdf: Vec<Float>,
    cdf: Vec<Float>,
}

impl Distribution1D {
    /// Negative and non-finite weights count as zero. If every weight is zero
    /// the distribution falls back to uniform.
    pub fn new(weights: &[Float]) -> Self {
        let clean: Vec<Float> = weights
            .iter()
            .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
            .collect();
        let total: Float = clean.iter().sum();
        let n = clean.len();

        let pdf: Vec<Float> = if total > 0.0 {
            clean.iter().map(|w| w / total).collect()
        } else if n > 0 {
            vec![1.0 / n as Float; n]
        } else {
            Vec::new()
        };

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        let mut running = 0.0;
        for p in &pdf {
            running += p;
            cdf.push(running);
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }

        Self { pdf, cdf }
    }

    pub fn len(&self) -> usize {
        self.pdf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdf.is_empty()
    }

    /// Returns the sampled index and its probability. Zero-probability entries
    /// are never returned.
    pub fn sample_discrete(&self, u: Float) -> Option<(usize, Float)> {
        if self.pdf.is_empty() {
            return None;
        }
        let u = u.clamp(0.0, 1.0);
        // First bucket whose upper CDF bound exceeds u.
        let mut index = self.cdf[1..].partition_point(|c| *c <= u);
        if index >= self.pdf.len() {
            index = self.pdf.len() - 1;
        }
        while self.pdf[index] == 0.0 && index > 0 {
            index -= 1;
        }
        Some((index, self.pdf[index]))
    }

    pub fn pdf_discrete(&self, index: usize) -> Float {
        self.pdf.get(index).copied().unwrap_or(0.0)
    }
}
