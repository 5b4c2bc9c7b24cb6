use std::cmp::Ordering;

/// Relative range below which a sequence is considered flat.
pub const FLAT_TOL: f64 = 1e-12;

pub fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Population variance (divides by `n`).
pub fn variance(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / vals.len() as f64
}

/// Sample variance (divides by `n - 1`).
pub fn sample_variance(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

pub fn sorted(vals: &[f64]) -> Vec<f64> {
    let mut sorted = vals.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn median(vals: &[f64]) -> f64 {
    percentile(&sorted(vals), 50.0)
}

/// Percentile `q` (in `[0, 100]`) of already sorted data, interpolating
/// linearly between neighbouring ranks.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n_vals = sorted.len();
    if n_vals == 0 {
        return f64::NAN;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (n_vals - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `num` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut vals: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            vals[num - 1] = stop;
            vals
        }
    }
}

pub fn cumsum(vals: &[f64]) -> Vec<f64> {
    vals.iter()
        .scan(0.0, |acc, &val| {
            *acc += val;
            Some(*acc)
        })
        .collect()
}

/// Whether the range of `vals` is negligible compared with `scale`.
pub fn is_flat(vals: &[f64], scale: f64) -> bool {
    let (min, max) = min_max(vals);
    max - min <= FLAT_TOL * scale.abs().max(1.0)
}

pub fn min_max(vals: &[f64]) -> (f64, f64) {
    vals.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &val| {
            (min.min(val), max.max(val))
        })
}

pub fn max_abs(vals: &[f64]) -> f64 {
    vals.iter().fold(0.0, |acc: f64, &val| acc.max(val.abs()))
}

/// Ordinary least-squares line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a least-squares line. Returns `None` for mismatched lengths, fewer
/// than two points, or a constant `x`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let x_mean = mean(x);
    let y_mean = mean(y);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxx += (xi - x_mean) * (xi - x_mean);
        sxy += (xi - x_mean) * (yi - y_mean);
    }
    if sxx <= 0.0 || !sxx.is_finite() {
        return None;
    }
    let slope = sxy / sxx;
    Some(LinearFit {
        intercept: y_mean - slope * x_mean,
        slope,
    })
}

/// Subtract the least-squares line over the indices `0..n`.
pub fn detrend(vals: &[f64]) -> Vec<f64> {
    let idx: Vec<f64> = (0..vals.len()).map(|i| i as f64).collect();
    match linear_fit(&idx, vals) {
        Some(fit) => vals
            .iter()
            .zip(&idx)
            .map(|(&val, &t)| val - fit.predict(t))
            .collect(),
        None => vals.to_vec(),
    }
}

/// Number of histogram bins from the smaller of the Sturges and
/// Freedman-Diaconis bin widths, together with the bin edges range.
fn auto_bins(vals: &[f64]) -> (usize, f64, f64) {
    let (min, max) = min_max(vals);
    if min == max {
        return (1, min - 0.5, max + 0.5);
    }
    let n_vals = vals.len() as f64;
    let ptp = max - min;

    let sturges = ptp / (n_vals.log2() + 1.0);
    let sorted = sorted(vals);
    let iqr = percentile(&sorted, 75.0) - percentile(&sorted, 25.0);
    let fd = 2.0 * iqr * n_vals.powf(-1.0 / 3.0);
    let width = if fd > 0.0 { fd.min(sturges) } else { sturges };

    let n_bins = if width > 0.0 {
        ((ptp / width).ceil() as usize).max(1)
    } else {
        1
    };
    (n_bins, min, max)
}

/// Density histogram with automatically chosen equal-width bins.
///
/// Each returned value is `count / (n * bin_width)`, so the densities
/// integrate to one over the bin range. Empty input gives no bins.
pub fn density_histogram(vals: &[f64]) -> Vec<f64> {
    if vals.is_empty() {
        return Vec::new();
    }
    let (n_bins, first, last) = auto_bins(vals);
    let edges = linspace(first, last, n_bins + 1);
    let norm = n_bins as f64 / (last - first);

    let mut counts = vec![0usize; n_bins];
    for &val in vals {
        let mut idx = (((val - first) * norm) as usize).min(n_bins - 1);
        // Floating-point rounding can push a value one bin off its edges.
        if idx > 0 && val < edges[idx] {
            idx -= 1;
        } else if idx + 1 < n_bins && val >= edges[idx + 1] {
            idx += 1;
        }
        counts[idx] += 1;
    }

    let bin_width = (last - first) / n_bins as f64;
    let total = vals.len() as f64;
    counts
        .into_iter()
        .map(|count| count as f64 / (total * bin_width))
        .collect()
}

/// Ranks of `vals` as an ordinal pattern: the indices that sort the values,
/// ties broken by position.
pub fn argsort(vals: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..vals.len()).collect();
    idx.sort_by(|&a, &b| match vals[a].total_cmp(&vals[b]) {
        Ordering::Equal => a.cmp(&b),
        ord => ord,
    });
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn linspace_includes_both_ends() {
        let vals = linspace(0.0, 1.0, 5);
        assert_eq!(vals, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn linear_fit_recovers_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let fit = linear_fit(&x, &y).unwrap();
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!(linear_fit(&[1.0, 1.0], &[0.0, 1.0]).is_none());
    }

    #[test]
    fn detrend_removes_linear_component() {
        let vals: Vec<f64> = (0..20).map(|i| 3.0 + 0.5 * i as f64).collect();
        assert!(detrend(&vals).iter().all(|val| val.abs() < 1e-9));
    }

    #[test]
    fn density_histogram_integrates_to_one() {
        let vals: Vec<f64> = (0..40).map(|i| ((i * 7) % 13) as f64 * 0.3).collect();
        let (_, first, last) = auto_bins(&vals);
        let dens = density_histogram(&vals);
        let bin_width = (last - first) / dens.len() as f64;
        let total: f64 = dens.iter().map(|d| d * bin_width).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn auto_bins_takes_narrower_of_sturges_and_freedman_diaconis() {
        // Uniform ranks: Sturges gives log2(100) + 1 = 7.64 bins, FD 4.64.
        let ranks: Vec<f64> = (0..100).map(f64::from).collect();
        assert_eq!(auto_bins(&ranks), (8, 0.0, 99.0));
        // One outlier: FD width 20 / 21^(1/3) gives 137.9 bins, Sturges 5.4.
        let mut outlier: Vec<f64> = (0..20).map(f64::from).collect();
        outlier.push(1000.0);
        assert_eq!(auto_bins(&outlier), (138, 0.0, 1000.0));
        // Three equal values and one apart: FD 0.315, Sturges 0.333.
        assert_eq!(auto_bins(&[-1.0, -1.0, 1.0, -1.0]), (4, -1.0, 1.0));
        assert_eq!(
            density_histogram(&[-1.0, -1.0, 1.0, -1.0]),
            vec![1.5, 0.0, 0.0, 0.5]
        );
    }

    #[test]
    fn density_histogram_of_constant_is_single_unit_bin() {
        assert_eq!(density_histogram(&[2.0; 6]), vec![1.0]);
    }

    #[test]
    fn argsort_breaks_ties_by_position() {
        assert_eq!(argsort(&[3.0, 1.0, 2.0]), vec![1, 2, 0]);
        assert_eq!(argsort(&[1.0, 1.0, 0.0]), vec![2, 0, 1]);
    }

    #[test]
    fn flatness_is_relative_to_scale() {
        assert!(is_flat(&[5.0; 10], 5.0));
        assert!(!is_flat(&[5.0, 5.1], 5.0));
    }
}
