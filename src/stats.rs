use crate::numeric::{mean, median, min_max, sample_variance};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Running mean and variance (Welford).
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Column summary in the spirit of a `describe` table.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

pub fn summarize(vals: &[f64]) -> Summary {
    let (min, max) = if vals.is_empty() {
        (f64::NAN, f64::NAN)
    } else {
        min_max(vals)
    };
    Summary {
        count: vals.len(),
        mean: mean(vals),
        std_dev: sample_variance(vals).sqrt(),
        min,
        median: median(vals),
        max,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInterval {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Student-t confidence interval of the mean. Needs at least two values.
pub fn confidence_interval(vals: &[f64], confidence: f64) -> Option<ConfidenceInterval> {
    let n_vals = vals.len();
    if n_vals < 2 || !(confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let mean = mean(vals);
    let std_dev = sample_variance(vals).sqrt();
    let alpha = 1.0 - confidence;
    let t_val = student_t_quantile(1.0 - alpha / 2.0, (n_vals - 1) as f64);
    let half = t_val * std_dev / (n_vals as f64).sqrt();
    Some(ConfidenceInterval {
        n_vals,
        mean,
        std_dev,
        lower: mean - half,
        upper: mean + half,
    })
}

/// Statistic and two-sided p-value of a test.
#[derive(Debug, Clone, Copy)]
pub struct TestResult {
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample Student t-test with pooled variance.
pub fn t_test_ind(a: &[f64], b: &[f64]) -> Option<TestResult> {
    let (n_a, n_b) = (a.len(), b.len());
    if n_a < 2 || n_b < 2 {
        return None;
    }
    let dof = (n_a + n_b - 2) as f64;
    let pooled =
        ((n_a - 1) as f64 * sample_variance(a) + (n_b - 1) as f64 * sample_variance(b)) / dof;
    let se = (pooled * (1.0 / n_a as f64 + 1.0 / n_b as f64)).sqrt();
    if se <= 0.0 || !se.is_finite() {
        return None;
    }
    let statistic = (mean(a) - mean(b)) / se;
    Some(TestResult {
        statistic,
        p_value: student_t_two_sided_p(statistic, dof),
    })
}

/// One-way ANOVA across groups; empty groups are ignored.
pub fn one_way_anova(groups: &[&[f64]]) -> Option<TestResult> {
    let groups: Vec<&[f64]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    let n_groups = groups.len();
    let n_vals: usize = groups.iter().map(|g| g.len()).sum();
    if n_groups < 2 || n_vals <= n_groups {
        return None;
    }

    let grand_mean = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n_vals as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in &groups {
        let group_mean = mean(group);
        ss_between += group.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += group.iter().map(|&v| (v - group_mean).powi(2)).sum::<f64>();
    }

    let dof_between = (n_groups - 1) as f64;
    let dof_within = (n_vals - n_groups) as f64;
    if ss_within <= 0.0 {
        return None;
    }
    let statistic = (ss_between / dof_between) / (ss_within / dof_within);
    Some(TestResult {
        statistic,
        p_value: f_survival(statistic, dof_between, dof_within),
    })
}

/// Cohen's d with pooled standard deviation.
pub fn cohens_d(a: &[f64], b: &[f64]) -> Option<f64> {
    let (n_a, n_b) = (a.len(), b.len());
    if n_a < 2 || n_b < 2 {
        return None;
    }
    let pooled = (((n_a - 1) as f64 * sample_variance(a) + (n_b - 1) as f64 * sample_variance(b))
        / (n_a + n_b - 2) as f64)
        .sqrt();
    if pooled <= 0.0 {
        return None;
    }
    Some((mean(a) - mean(b)) / pooled)
}

/// Pearson correlation with a two-sided p-value from the t distribution.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<TestResult> {
    let n_vals = x.len();
    if n_vals != y.len() || n_vals < 3 {
        return None;
    }
    let (x_mean, y_mean) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        sxy += (xi - x_mean) * (yi - y_mean);
        sxx += (xi - x_mean).powi(2);
        syy += (yi - y_mean).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let dof = (n_vals - 2) as f64;
    let p_value = if r.abs() >= 1.0 {
        0.0
    } else {
        student_t_two_sided_p(r * (dof / (1.0 - r * r)).sqrt(), dof)
    };
    Some(TestResult {
        statistic: r,
        p_value,
    })
}

pub fn significance_stars(p_value: f64) -> &'static str {
    if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else {
        "ns"
    }
}

pub fn effect_size_label(d: f64) -> &'static str {
    let d = d.abs();
    if d < 0.2 {
        "negligible"
    } else if d < 0.5 {
        "small"
    } else if d < 0.8 {
        "medium"
    } else {
        "large"
    }
}

fn students_t(dof: f64) -> Option<StudentsT> {
    StudentsT::new(0.0, 1.0, dof).ok()
}

/// Two-sided p-value `P(|T| >= |t|)` for Student's t with `dof` degrees.
pub fn student_t_two_sided_p(t: f64, dof: f64) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    match students_t(dof) {
        Some(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        None => f64::NAN,
    }
}

/// Quantile of Student's t distribution.
pub fn student_t_quantile(q: f64, dof: f64) -> f64 {
    if !(q > 0.0 && q < 1.0) {
        return f64::NAN;
    }
    match students_t(dof) {
        Some(dist) => dist.inverse_cdf(q),
        None => f64::NAN,
    }
}

/// Survival function `P(F >= f)` of the F distribution.
pub fn f_survival(f: f64, dof_1: f64, dof_2: f64) -> f64 {
    if f <= 0.0 {
        return 1.0;
    }
    match FisherSnedecor::new(dof_1, dof_2) {
        Ok(dist) => dist.sf(f),
        Err(_) => f64::NAN,
    }
}
