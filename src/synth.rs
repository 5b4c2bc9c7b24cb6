use crate::config::{ProfileConfig, TractsConfig};
use crate::model::{OpticalProfiles, Profile, Region, Tract};
use crate::numeric::{linspace, mean};
use anyhow::{Context, Result, bail};
use rand::{Rng, seq::index};
use rand_distr::{Distribution, Normal, StandardNormal, Uniform};
use std::f64::consts::PI;

impl ProfileConfig {
    /// Synthesize a profile whose mean equals `target`.
    pub fn synthesize<R: Rng + ?Sized>(&self, target: f64, rng: &mut R) -> Result<Profile> {
        if !(target.is_finite() && target > 0.0) {
            bail!("target must be positive and finite, but is {target}");
        }
        if self.n_points == 0 {
            bail!("number of points must be positive");
        }

        let x = linspace(0.0, 1.0, self.n_points);
        let mut vals: Vec<f64> = x
            .iter()
            .map(|&xi| {
                let trend = target * (-self.decay * xi).exp();
                let sine = self.sine_amp * target * (2.0 * PI * self.sine_cycles * xi).sin();
                let noise: f64 = StandardNormal.sample(rng);
                trend + sine + self.noise_amp * target * noise
            })
            .collect();

        let n_spikes = self.n_spikes.min(self.n_points);
        for pos in index::sample(rng, self.n_points, n_spikes) {
            vals[pos] += self.spike_amp * target;
        }

        // Rescale so that the mean hits the target exactly.
        let mean = mean(&vals);
        if mean.abs() > f64::EPSILON {
            let scale = target / mean;
            vals.iter_mut().for_each(|val| *val *= scale);
        }

        Profile::new(vals).context("failed to build profile")
    }
}

impl OpticalProfiles {
    /// Generate V-number, transmission and OPC profiles on `n_points`
    /// uniform positions along a tract.
    pub fn generate<R: Rng + ?Sized>(n_points: usize, rng: &mut R) -> Result<Self> {
        let x = linspace(0.0, 1.0, n_points);
        let unit = Uniform::new(0.0, 1.0)?;

        let v_base = 0.741 + Normal::new(0.0, 0.1)?.sample(rng);
        let v_freq = 1.5 + unit.sample(rng);
        let v_noise = Normal::new(0.0, 0.02)?;
        let v: Vec<f64> = x
            .iter()
            .map(|&xi| {
                let val = v_base + 0.05 * (2.0 * PI * v_freq * xi).sin() + v_noise.sample(rng);
                val.clamp(0.1, 2.0)
            })
            .collect();

        let t_base = 0.65 + Normal::new(0.0, 0.1)?.sample(rng);
        let t_freq = 0.7 + 0.6 * unit.sample(rng);
        let t_phase = 2.0 * PI * unit.sample(rng);
        let t_noise = Normal::new(0.0, 0.05)?;
        let t: Vec<f64> = x
            .iter()
            .map(|&xi| {
                let val = t_base
                    + 0.1 * (2.0 * PI * t_freq * xi + t_phase).sin()
                    + t_noise.sample(rng);
                val.clamp(0.0, 1.0)
            })
            .collect();

        let opc: Vec<f64> = v.iter().zip(&t).map(|(&vi, &ti)| vi * ti).collect();

        Ok(Self {
            v: Profile::new(v).context("failed to build V profile")?,
            t: Profile::new(t).context("failed to build T profile")?,
            opc: Profile::new(opc).context("failed to build OPC profile")?,
        })
    }

    /// Textured counterparts whose means match these profiles.
    pub fn texture<R: Rng + ?Sized>(&self, shape: &ProfileConfig, rng: &mut R) -> Result<Self> {
        Ok(Self {
            v: shape
                .synthesize(self.v.mean(), rng)
                .context("failed to texture V profile")?,
            t: shape
                .synthesize(self.t.mean(), rng)
                .context("failed to texture T profile")?,
            opc: shape
                .synthesize(self.opc.mean(), rng)
                .context("failed to texture OPC profile")?,
        })
    }
}

impl Tract {
    /// Generate tract `i_tract` of batch `batch`.
    pub fn generate<R: Rng + ?Sized>(
        batch: usize,
        i_tract: usize,
        tracts: &TractsConfig,
        shape: &ProfileConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let length_mm = Uniform::new_inclusive(tracts.length_min, tracts.length_max)?.sample(rng);
        let optical = OpticalProfiles::generate(tracts.n_points, rng)
            .context("failed to generate optical profiles")?;
        let textured = optical
            .texture(shape, rng)
            .context("failed to generate textured profiles")?;

        Ok(Self {
            id: format!("batch-{batch:04}_tract_{i_tract:03}"),
            batch,
            length_mm,
            region: Region::from_length(length_mm),
            optical,
            textured,
        })
    }
}
