//! Wavelength subsampling and linear interpolation.
//!
//! Only every `step`-th bin of a spectrum is integrated exactly; bins in
//! between are linearly interpolated in X. The last bin is always
//! evaluated so interpolation never runs past the final computed point.

/// Chooses which bins of a spectrum are evaluated exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavelengthSampler {
    bins: usize,
    step: usize,
}

impl WavelengthSampler {
    /// Sampler for `bins` values with `requested` exact points; `None` or 0
    /// evaluates every bin.
    pub fn new(bins: usize, requested: Option<usize>) -> Self {
        let step = match requested {
            Some(points) if points > 0 => (bins / points).max(1),
            _ => 1,
        };
        Self { bins, step }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Ascending indices of the exactly evaluated bins.
    pub fn indices(&self) -> Vec<usize> {
        if self.bins == 0 {
            return Vec::new();
        }
        let mut indices: Vec<usize> = (0..self.bins).step_by(self.step).collect();
        let last = self.bins - 1;
        if indices.last() != Some(&last) {
            indices.push(last);
        }
        indices
    }

    /// Evaluate `eval` at the sampled bins and interpolate the rest.
    pub fn fill<F>(&self, points: &[f64], out: &mut [f64], mut eval: F)
    where
        F: FnMut(usize) -> f64,
    {
        let indices = self.indices();
        for &k in &indices {
            out[k] = eval(k);
        }
        interpolate(points, out, &indices);
    }
}

/// Fill the gaps between the already computed `out[k]`, `k ∈ computed`,
/// by linear interpolation in `points`.
pub fn interpolate(points: &[f64], out: &mut [f64], computed: &[usize]) {
    for pair in computed.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi <= lo + 1 {
            continue;
        }
        let (x_lo, x_hi) = (points[lo], points[hi]);
        let (y_lo, y_hi) = (out[lo], out[hi]);
        let span = x_hi - x_lo;
        for k in lo + 1..hi {
            out[k] = if span == 0.0 {
                y_lo
            } else {
                y_lo + (points[k] - x_lo) / span * (y_hi - y_lo)
            };
        }
    }
}
