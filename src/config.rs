use crate::complexity::KACI_MIN_KNOTS;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Tool configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base seed; batch `i` is generated from `seed + i`.
    pub seed: u64,

    /// Tract generation parameters.
    pub tracts: TractsConfig,

    /// Textured profile parameters.
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Complexity estimator parameters.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Statistical analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TractsConfig {
    /// Number of tracts per batch.
    pub n_tracts: usize,
    /// Number of points of the optical profiles.
    pub n_points: usize,
    /// Minimum tract length (mm).
    pub length_min: f64,
    /// Maximum tract length (mm).
    pub length_max: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Number of points of the textured profiles.
    pub n_points: usize,
    /// Exponential decay rate of the trend along the tract.
    pub decay: f64,
    /// Sinusoid amplitude relative to the target mean.
    pub sine_amp: f64,
    /// Number of sinusoid cycles along the tract.
    pub sine_cycles: f64,
    /// Gaussian noise amplitude relative to the target mean.
    pub noise_amp: f64,
    /// Number of localized spikes.
    pub n_spikes: usize,
    /// Spike height relative to the target mean.
    pub spike_amp: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            n_points: 50,
            decay: 0.1,
            sine_amp: 0.1,
            sine_cycles: 3.0,
            noise_amp: 0.05,
            n_spikes: 3,
            spike_amp: 0.2,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Linearly detrend profiles before DEA.
    pub detrend: bool,
    /// KACI error threshold as a fraction of the profile variance.
    pub mse_frac: f64,
    /// Largest knot count tried by KACI.
    pub max_knots: usize,
    /// Permutation entropy embedding order.
    pub pe_order: usize,
    /// Permutation entropy embedding delay.
    pub pe_delay: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            detrend: true,
            mse_frac: 0.06,
            max_knots: 16,
            pe_order: 3,
            pe_delay: 1,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fraction of transmission kept after demyelination.
    pub demyel_factor: f64,
    /// Confidence level of the reported intervals.
    pub confidence: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            demyel_factor: 0.5,
            confidence: 0.95,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents = fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let tracts = &self.tracts;
        check_num(tracts.n_tracts, 1..100_000).context("invalid number of tracts")?;
        check_num(tracts.n_points, 1..10_000).context("invalid number of optical points")?;
        check_num(tracts.length_min, 0.0..1_000.0).context("invalid minimum tract length")?;
        check_num(tracts.length_max, tracts.length_min..1_000.0)
            .context("invalid maximum tract length")?;

        let profile = &self.profile;
        check_num(profile.n_points, 1..10_000).context("invalid number of textured points")?;
        check_num(profile.decay, 0.0..100.0).context("invalid decay rate")?;
        check_num(profile.sine_amp, 0.0..10.0).context("invalid sine amplitude")?;
        check_num(profile.sine_cycles, 0.0..1_000.0).context("invalid number of sine cycles")?;
        check_num(profile.noise_amp, 0.0..10.0).context("invalid noise amplitude")?;
        check_num(profile.n_spikes, 0..=profile.n_points).context("invalid number of spikes")?;
        check_num(profile.spike_amp, 0.0..10.0).context("invalid spike amplitude")?;

        let metrics = &self.metrics;
        check_num(metrics.mse_frac, 0.0..=1.0).context("invalid KACI error fraction")?;
        check_num(metrics.max_knots, KACI_MIN_KNOTS..=64).context("invalid maximum knot count")?;
        check_num(metrics.pe_order, 2..=8).context("invalid permutation entropy order")?;
        check_num(metrics.pe_delay, 1..=100).context("invalid permutation entropy delay")?;

        let analysis = &self.analysis;
        check_num(analysis.demyel_factor, 0.0..=1.0).context("invalid demyelination factor")?;
        check_num(analysis.confidence, 0.5..1.0).context("invalid confidence level")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
seed = 42

[tracts]
n_tracts = 10
n_points = 100
length_min = 10.0
length_max = 80.0
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.profile, ProfileConfig::default());
        assert_eq!(config.metrics, MetricsConfig::default());
        assert_eq!(config.analysis.demyel_factor, 0.5);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let contents = format!("{MINIMAL}\n[metrics]\nmax_knots = 10\n");
        let config: Config = toml::from_str(&contents).unwrap();
        assert_eq!(config.metrics.max_knots, 10);
        assert_eq!(config.metrics.mse_frac, 0.06);
        assert!(config.metrics.detrend);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.tracts.length_max = 5.0;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.metrics.max_knots = 2;
        assert!(config.validate().is_err());

        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.profile.n_spikes = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_tracts_section_is_an_error() {
        assert!(toml::from_str::<Config>("seed = 1\n").is_err());
    }
}
