//! Mean / population standard deviation over a subset of a series.

use serde::{Deserialize, Serialize};

/// Below this (relative to the mean) a baseline is considered flat.
/// Samples carry two decimals, so real spread is far larger.
const SPREAD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    /// Population standard deviation; zero when `sample_count <= 1`.
    pub std_dev: f64,
    pub sample_count: usize,
}

impl Baseline {
    /// `None` for an empty subset.
    pub fn compute<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().collect();
        let n = values.len();
        if n == 0 {
            return None;
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let std_dev = if n <= 1 {
            0.0
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
            var.sqrt()
        };
        Some(Self {
            mean,
            std_dev,
            sample_count: n,
        })
    }

    /// Whether statistical classification can flag anything at all.
    pub fn has_spread(&self) -> bool {
        self.sample_count > 1 && self.std_dev > SPREAD_EPSILON * self.mean.abs().max(1.0)
    }

    /// `(mean - k*std_dev, mean + k*std_dev)`
    pub fn bounds(&self, k: f64) -> (f64, f64) {
        (self.mean - k * self.std_dev, self.mean + k * self.std_dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_dev() {
        let b = Baseline::compute([10.0, 20.0, 90.0]).unwrap();
        assert!((b.mean - 40.0).abs() < 1e-9);
        assert!((b.std_dev - 35.590_260_840_104_37).abs() < 1e-9);
        assert_eq!(b.sample_count, 3);
    }

    #[test]
    fn single_value_has_no_spread() {
        let b = Baseline::compute([42.0]).unwrap();
        assert_eq!(b.std_dev, 0.0);
        assert!(!b.has_spread());
    }

    #[test]
    fn identical_values_have_no_spread() {
        let b = Baseline::compute([0.1, 0.1, 0.1]).unwrap();
        assert!(!b.has_spread());
    }

    #[test]
    fn empty_subset() {
        assert!(Baseline::compute(std::iter::empty()).is_none());
    }
}
