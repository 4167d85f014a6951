//! Summary statistics and bootstrap confidence intervals over a numeric
//! sample, as consumed by the timeline updater after each drain.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bootstrap replicate count the updater uses unless overridden by config.
pub const DEFAULT_BOOTSTRAP_REPLICATES: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator); 0.0 for a single sample.
    pub stddev: f64,
    pub median: f64,
    pub num_samples: usize,
    pub bci95_low: f64,
    pub bci95_up: f64,
}

/// Compute [`SummaryStats`] over `samples` using a nondeterministic RNG.
///
/// `replicates` is the number of bootstrap resamples drawn for the 95%
/// confidence interval of the mean.
pub fn compute_summary(samples: &[f64], replicates: u32) -> Result<SummaryStats> {
    compute_summary_with_rng(samples, replicates, &mut StdRng::from_entropy())
}

/// Seedable variant for deterministic tests.
pub fn compute_summary_seeded(samples: &[f64], replicates: u32, seed: u64) -> Result<SummaryStats> {
    compute_summary_with_rng(samples, replicates, &mut StdRng::seed_from_u64(seed))
}

fn compute_summary_with_rng(
    samples: &[f64],
    replicates: u32,
    rng: &mut impl Rng,
) -> Result<SummaryStats> {
    let n = samples.len();
    if n == 0 {
        return Err(anyhow!("compute_summary requires at least one sample"));
    }

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = mean_of(samples);
    let median = median_of(samples);

    if n == 1 {
        let v = samples[0];
        return Ok(SummaryStats {
            min: v,
            max: v,
            mean: v,
            stddev: 0.0,
            median: v,
            num_samples: 1,
            bci95_low: v,
            bci95_up: v,
        });
    }

    let stddev = sample_stddev(samples, mean);
    let (bci95_low, bci95_up) = bootstrap_bci95(samples, replicates.max(1), rng);

    Ok(SummaryStats {
        min,
        max,
        mean,
        stddev,
        median,
        num_samples: n,
        bci95_low,
        bci95_up,
    })
}

fn mean_of(samples: &[f64]) -> f64 {
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn sample_stddev(samples: &[f64], mean: f64) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

/// Median via linear interpolation on the two central order statistics.
fn median_of(samples: &[f64]) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("samples must be finite"));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Nearest-rank percentile on an already-sorted slice. `p` is in `[0, 1]`.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let r = sorted.len();
    let rank = ((p * r as f64).ceil() as usize).clamp(1, r);
    sorted[rank - 1]
}

fn bootstrap_bci95(samples: &[f64], replicates: u32, rng: &mut impl Rng) -> (f64, f64) {
    let n = samples.len();
    let mut means = Vec::with_capacity(replicates as usize);

    for _ in 0..replicates {
        let mut sum = 0.0;
        for _ in 0..n {
            let idx = rng.gen_range(0..n);
            sum += samples[idx];
        }
        means.push(sum / n as f64);
    }

    means.sort_by(|a, b| a.partial_cmp(b).expect("bootstrap means must be finite"));
    (nearest_rank(&means, 0.025), nearest_rank(&means, 0.975))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_collapses_all_stats() {
        let s = compute_summary_seeded(&[42.0], 1000, 7).unwrap();
        assert_eq!(s.min, 42.0);
        assert_eq!(s.max, 42.0);
        assert_eq!(s.mean, 42.0);
        assert_eq!(s.median, 42.0);
        assert_eq!(s.stddev, 0.0);
        assert_eq!(s.bci95_low, 42.0);
        assert_eq!(s.bci95_up, 42.0);
        assert_eq!(s.num_samples, 1);
    }

    #[test]
    fn constant_sample_has_zero_spread_regardless_of_replicates() {
        let k = 3.5;
        let sample = vec![k; 24];
        for replicates in [1u32, 10, 1000] {
            let s = compute_summary_seeded(&sample, replicates, 1).unwrap();
            assert_eq!(s.mean, k);
            assert_eq!(s.median, k);
            assert_eq!(s.min, k);
            assert_eq!(s.max, k);
            assert_eq!(s.stddev, 0.0);
            assert_eq!(s.bci95_low, k);
            assert_eq!(s.bci95_up, k);
        }
    }

    #[test]
    fn median_interpolates_even_length() {
        let s = compute_summary_seeded(&[1.0, 2.0, 3.0, 4.0], 100, 1).unwrap();
        assert_eq!(s.median, 2.5);
    }

    #[test]
    fn stddev_uses_n_minus_one_denominator() {
        // samples 2,4,4,4,5,5,7,9 -> population mean 5, sample stddev = 2.138...
        let s = compute_summary_seeded(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 100, 1).unwrap();
        assert!((s.stddev - 2.138_089_935_299_395).abs() < 1e-9);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let sample = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let a = compute_summary_seeded(&sample, 500, 99).unwrap();
        let b = compute_summary_seeded(&sample, 500, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bci_brackets_the_mean_for_a_spread_sample() {
        let sample: Vec<f64> = (1..=50).map(|v| v as f64).collect();
        let s = compute_summary_seeded(&sample, 2000, 42).unwrap();
        assert!(s.bci95_low <= s.mean);
        assert!(s.bci95_up >= s.mean);
    }

    #[test]
    fn empty_sample_is_rejected() {
        assert!(compute_summary(&[], 100).is_err());
    }
}
