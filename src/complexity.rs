//! All estimators are total: inputs too short for an estimator give `None`,
//! or `0.0` for Lempel-Ziv and permutation entropy.

use crate::numeric::{
    argsort, cumsum, density_histogram, detrend, is_flat, linear_fit, linspace, max_abs, mean,
    median, variance,
};
use crate::spline::{CUBIC, Spline};
use std::collections::BTreeMap;

/// Minimum sequence length accepted by [`dea`].
pub const DEA_MIN_LEN: usize = 20;
/// Minimum sequence length accepted by [`kaci`].
pub const KACI_MIN_LEN: usize = 8;
/// Smallest knot count tried by [`kaci`].
pub const KACI_MIN_KNOTS: usize = 4;

const DEA_MIN_WINDOW: usize = 4;
const DEA_MIN_SEGMENTS: usize = 4;
const DEA_N_WINDOWS: usize = 10;

/// Diffusion-entropy scaling exponent of a sequence.
///
/// The mean-centered (and optionally linearly detrended) sequence is
/// integrated, split into non-overlapping windows of several sizes, and the
/// Shannon entropy of the end-to-start dispersion density is regressed on
/// the log window size. The slope is the exponent.
///
/// Returns `None` for fewer than [`DEA_MIN_LEN`] values, non-finite values,
/// a flat sequence, or when fewer than two window sizes are usable.
pub fn dea(vals: &[f64], detrend_first: bool) -> Option<f64> {
    let n_vals = vals.len();
    if n_vals < DEA_MIN_LEN || vals.iter().any(|val| !val.is_finite()) {
        return None;
    }

    let x = if detrend_first {
        detrend(vals)
    } else {
        vals.to_vec()
    };
    if is_flat(&x, max_abs(vals)) {
        return None;
    }

    let x_mean = mean(&x);
    let centered: Vec<f64> = x.iter().map(|&val| val - x_mean).collect();
    let y = cumsum(&centered);

    let mut log_sizes = Vec::with_capacity(DEA_N_WINDOWS);
    let mut entropies = Vec::with_capacity(DEA_N_WINDOWS);
    for size in dea_window_sizes(n_vals) {
        if size >= n_vals {
            break;
        }
        let n_segs = n_vals / size;
        if n_segs < DEA_MIN_SEGMENTS {
            continue;
        }
        let disp: Vec<f64> = y[..n_segs * size]
            .chunks_exact(size)
            .map(|seg| seg[size - 1] - seg[0])
            .collect();
        let dens = density_histogram(&disp);
        if dens.iter().all(|&p| p <= 0.0) {
            continue;
        }
        let entropy = -dens
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| p * p.ln())
            .sum::<f64>();
        log_sizes.push((size as f64).ln());
        entropies.push(entropy);
    }

    if entropies.len() < 2 {
        return None;
    }
    linear_fit(&log_sizes, &entropies).map(|fit| fit.slope)
}

/// Candidate window sizes: evenly spaced between the minimum window and
/// `max(8, n / 5)`, truncated to integers and deduplicated.
fn dea_window_sizes(n_vals: usize) -> Vec<usize> {
    let max_size = (n_vals / 5).max(8);
    let mut sizes: Vec<usize> = linspace(DEA_MIN_WINDOW as f64, max_size as f64, DEA_N_WINDOWS)
        .into_iter()
        .map(|size| size as usize)
        .collect();
    sizes.dedup();
    sizes
}

/// Knot-count complexity index of a sequence.
///
/// The sequence is placed on `linspace(0, 1, n)` and fitted with least-squares
/// cubic splines of `k` evenly spaced interior knots, for `k` growing from
/// [`KACI_MIN_KNOTS`]. The first `k` whose mean squared error is at most
/// `mse_frac` times the sequence variance is returned, or `max_knots` if none
/// qualifies. A `k` whose fit fails is skipped.
///
/// Returns `None` for fewer than [`KACI_MIN_LEN`] values or non-finite values.
/// A flat sequence returns the minimum knot count.
pub fn kaci(vals: &[f64], mse_frac: f64, max_knots: usize) -> Option<usize> {
    let n_vals = vals.len();
    if n_vals < KACI_MIN_LEN || vals.iter().any(|val| !val.is_finite()) {
        return None;
    }
    let max_knots = max_knots.max(KACI_MIN_KNOTS);

    let var = variance(vals);
    if var <= 0.0 {
        return Some(KACI_MIN_KNOTS);
    }
    let thr = mse_frac * var;

    let x = linspace(0.0, 1.0, n_vals);
    for n_knots in KACI_MIN_KNOTS..=max_knots {
        let all_knots = linspace(0.0, 1.0, n_knots + 2);
        let interior = &all_knots[1..=n_knots];
        let Some(spline) = Spline::fit(&x, vals, interior, CUBIC) else {
            continue;
        };
        let mse = x
            .iter()
            .zip(vals)
            .map(|(&xi, &yi)| (spline.eval(xi) - yi).powi(2))
            .sum::<f64>()
            / n_vals as f64;
        if mse <= thr {
            return Some(n_knots);
        }
    }
    Some(max_knots)
}

/// Result of the greedy Lempel-Ziv factorization of a binarized sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LempelZiv {
    /// Final scan position plus current factor length, over the length.
    pub ratio: f64,
    /// Number of factors recorded by the scan, the trailing one included.
    pub n_factors: usize,
    /// `n_factors * log2(n) / n`.
    pub normalized: f64,
}

/// Greedy Lempel-Ziv scan of the sequence binarized at its median.
///
/// The window `[i, i + c)` grows while its contents occur at an earlier
/// start `j < i`; otherwise a factor is recorded and the window restarts
/// after it. The scan only ends once `i + c` reaches the length, so the ratio
/// is `1.0` for every input of length two or more, constant input included.
/// Inputs shorter than two give all zeros.
pub fn lempel_ziv_scan(vals: &[f64]) -> LempelZiv {
    let n_vals = vals.len();
    if n_vals < 2 {
        return LempelZiv {
            ratio: 0.0,
            n_factors: 0,
            normalized: 0.0,
        };
    }

    let threshold = median(vals);
    let bits: Vec<bool> = vals.iter().map(|&val| val > threshold).collect();

    let mut i = 0;
    let mut c = 1;
    let mut n_factors = 0;
    while i + c < n_vals {
        let word = &bits[i..i + c];
        let found = (0..i).any(|j| &bits[j..j + c] == word);
        if found {
            c += 1;
        } else {
            n_factors += 1;
            i += c;
            c = 1;
        }
    }
    n_factors += 1;

    LempelZiv {
        ratio: (i + c) as f64 / n_vals as f64,
        n_factors,
        normalized: n_factors as f64 * (n_vals as f64).log2() / n_vals as f64,
    }
}

/// Lempel-Ziv complexity ratio in `[0, 1]`; see [`lempel_ziv_scan`].
pub fn lempel_ziv(vals: &[f64]) -> f64 {
    lempel_ziv_scan(vals).ratio
}

/// Permutation entropy in bits.
///
/// Every start index with a full embedding window contributes the ordinal
/// pattern of `order` values taken `delay` apart. Only relative order
/// matters, so any strictly increasing transform of the values leaves the
/// entropy unchanged.
///
/// Returns `0.0` when no full window fits, `order < 2` or `delay == 0`.
pub fn permutation_entropy(vals: &[f64], order: usize, delay: usize) -> f64 {
    if order < 2 || delay == 0 {
        return 0.0;
    }
    let span = (order - 1) * delay;
    if vals.len() <= span {
        return 0.0;
    }

    let mut counts: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
    let mut window = Vec::with_capacity(order);
    let n_windows = vals.len() - span;
    for start in 0..n_windows {
        window.clear();
        window.extend((0..order).map(|k| vals[start + k * delay]));
        *counts.entry(argsort(&window)).or_insert(0) += 1;
    }

    let total = n_windows as f64;
    -counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use rand_distr::StandardNormal;
    use std::f64::consts::PI;

    fn noise(n_vals: usize, seed: u64) -> Vec<f64> {
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        (0..n_vals).map(|_| rng.sample(StandardNormal)).collect()
    }

    fn wavy(n_vals: usize) -> Vec<f64> {
        linspace(0.0, 1.0, n_vals)
            .iter()
            .map(|&x| (2.0 * PI * 5.0 * x).sin() + 0.3 * x)
            .collect()
    }

    #[test]
    fn dea_undefined_below_min_len() {
        for n_vals in 0..DEA_MIN_LEN {
            assert!(dea(&noise(n_vals, 1), true).is_none(), "n = {n_vals}");
            assert!(dea(&noise(n_vals, 1), false).is_none(), "n = {n_vals}");
        }
    }

    #[test]
    fn dea_undefined_on_constant_and_linear_input() {
        assert!(dea(&[5.0; 50], true).is_none());
        assert!(dea(&[5.0; 50], false).is_none());
        let line: Vec<f64> = (0..60).map(|i| 0.2 * i as f64).collect();
        assert!(dea(&line, true).is_none());
    }

    #[test]
    fn dea_defined_and_finite_on_noise() {
        for seed in 0..5 {
            let val = dea(&noise(100, seed), true).expect("dea should be defined");
            assert!(val.is_finite());
        }
    }

    #[test]
    fn dea_rejects_non_finite_input() {
        let mut vals = noise(50, 3);
        vals[10] = f64::NAN;
        assert!(dea(&vals, true).is_none());
    }

    #[test]
    fn dea_window_sizes_are_increasing_and_start_at_four() {
        let sizes = dea_window_sizes(100);
        assert_eq!(sizes.first(), Some(&4));
        assert_eq!(sizes.last(), Some(&20));
        assert!(sizes.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(dea_window_sizes(20), vec![4, 5, 6, 7, 8]);
    }

    #[test]
    fn kaci_undefined_below_min_len() {
        for n_vals in 0..KACI_MIN_LEN {
            assert!(kaci(&noise(n_vals, 2), 0.06, 16).is_none());
        }
    }

    #[test]
    fn kaci_stays_within_bounds() {
        for n_vals in [8, 9, 12, 20, 50, 100] {
            for seed in 0..3 {
                let k = kaci(&noise(n_vals, seed), 0.06, 16).unwrap();
                assert!((KACI_MIN_KNOTS..=16).contains(&k), "n = {n_vals}, k = {k}");
            }
        }
    }

    #[test]
    fn kaci_is_deterministic() {
        let vals = wavy(60);
        assert_eq!(kaci(&vals, 0.06, 16), kaci(&vals, 0.06, 16));
        let vals = noise(80, 7);
        assert_eq!(kaci(&vals, 0.01, 12), kaci(&vals, 0.01, 12));
    }

    #[test]
    fn kaci_smooth_profile_needs_few_knots() {
        let vals: Vec<f64> = linspace(0.0, 1.0, 50).iter().map(|&x| x * x).collect();
        assert_eq!(kaci(&vals, 0.06, 16), Some(KACI_MIN_KNOTS));
    }

    #[test]
    fn kaci_white_noise_saturates() {
        assert_eq!(kaci(&noise(100, 11), 0.0, 10), Some(10));
    }

    #[test]
    fn kaci_flat_profile_returns_minimum() {
        assert_eq!(kaci(&[2.5; 30], 0.06, 16), Some(KACI_MIN_KNOTS));
    }

    #[test]
    fn lempel_ziv_short_input_is_zero() {
        assert_eq!(lempel_ziv(&[]), 0.0);
        assert_eq!(lempel_ziv(&[1.0]), 0.0);
    }

    #[test]
    fn lempel_ziv_constant_input() {
        let scan = lempel_ziv_scan(&[5.0; 50]);
        assert_eq!(scan.ratio, 1.0);
        assert_eq!(scan.n_factors, 2);
        assert!(scan.normalized < 0.25);
    }

    #[test]
    fn lempel_ziv_ratio_stays_in_unit_interval() {
        for n_vals in 2..40 {
            let ratio = lempel_ziv(&noise(n_vals, n_vals as u64));
            assert!((0.0..=1.0).contains(&ratio));
        }
    }

    #[test]
    fn lempel_ziv_noise_has_more_factors_than_constant() {
        let noisy = lempel_ziv_scan(&noise(100, 5));
        let flat = lempel_ziv_scan(&[1.0; 100]);
        assert!(noisy.n_factors > flat.n_factors);
    }

    #[test]
    fn permutation_entropy_of_increasing_sequence_is_zero() {
        let vals: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(permutation_entropy(&vals, 3, 1), 0.0);
        assert_eq!(permutation_entropy(&vals[..3], 3, 1), 0.0);
    }

    #[test]
    fn permutation_entropy_short_input_is_zero() {
        assert_eq!(permutation_entropy(&[1.0, 2.0], 3, 1), 0.0);
        assert_eq!(permutation_entropy(&[1.0, 3.0, 2.0, 0.0], 3, 2), 0.0);
        assert_eq!(permutation_entropy(&[], 3, 1), 0.0);
        assert_eq!(permutation_entropy(&[3.0, 1.0, 2.0], 3, 0), 0.0);
    }

    #[test]
    fn permutation_entropy_invariant_under_monotonic_transform() {
        let vals = noise(64, 9);
        let transformed: Vec<f64> = vals.iter().map(|&v| (2.0 * v).exp() + 3.0).collect();
        let a = permutation_entropy(&vals, 3, 1);
        let b = permutation_entropy(&transformed, 3, 1);
        assert_eq!(a, b);
        assert!(a > 0.0);
        assert!(a <= 6f64.log2() + 1e-12);
    }

    #[test]
    fn permutation_entropy_two_equiprobable_patterns_is_one_bit() {
        let vals = [0.0, 1.0, 0.0, 1.0, 0.0];
        assert!((permutation_entropy(&vals, 2, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dea_slope_of_two_window_sizes() {
        // Centered values are -0.25 except 2.75 at 0 and 1.75 at 4. Windows
        // of 4 all move by -0.75, a single unit bin with zero entropy. Windows
        // of 5 move by [1, -1, -1, -1]: four bins of width 0.5 with densities
        // 1.5 and 0.5. Larger windows have fewer than four segments.
        let mut vals = [0.0; 20];
        vals[0] = 3.0;
        vals[4] = 2.0;
        let entropy_5 = -(1.5 * 1.5f64.ln() + 0.5 * 0.5f64.ln());
        let expected = entropy_5 / (5f64.ln() - 4f64.ln());
        let slope = dea(&vals, false).unwrap();
        assert!((slope - expected).abs() < 1e-12, "slope = {slope}");
        assert!((slope + 1.172_447_379_014_236).abs() < 1e-12);
    }

    #[test]
    fn kaci_picks_first_knot_count_below_threshold() {
        let x = linspace(0.0, 1.0, 100);
        // Relative errors for k = 4, 5, 6 are about 0.090, 0.302 and 0.016.
        let three_cycles: Vec<f64> = x.iter().map(|&t| (2.0 * PI * 3.0 * t).sin()).collect();
        assert_eq!(kaci(&three_cycles, 0.06, 16), Some(6));
        // Relative errors for k = 10, 11 are about 0.065 and 0.038.
        let five_cycles: Vec<f64> = x.iter().map(|&t| (2.0 * PI * 5.0 * t).sin()).collect();
        assert_eq!(kaci(&five_cycles, 0.05, 16), Some(11));
    }

    #[test]
    fn kaci_reproduces_spline_on_its_own_knot_grid() {
        // A single cubic break at 3/7 lies on the grid of k = 6 only.
        let vals: Vec<f64> = linspace(0.0, 1.0, 100)
            .iter()
            .map(|&t| (t - 3.0 / 7.0).max(0.0).powi(3))
            .collect();
        assert_eq!(kaci(&vals, 1e-9, 16), Some(6));
    }
}
