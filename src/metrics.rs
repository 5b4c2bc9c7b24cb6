use crate::complexity::{dea, kaci, lempel_ziv_scan, permutation_entropy};
use crate::config::MetricsConfig;
use crate::model::{Region, Tract};

/// Metrics of a single tract, one row of the metrics table.
#[derive(Debug, Clone, PartialEq)]
pub struct TractMetrics {
    pub tract_id: String,
    pub batch: usize,
    pub length_mm: f64,
    pub region: Region,

    pub v_mean: f64,
    pub t_mean: f64,
    pub opc_mean: f64,

    pub dea_v: Option<f64>,
    pub dea_t: Option<f64>,
    pub dea_opc: Option<f64>,

    pub kaci_v: Option<usize>,
    pub kaci_t: Option<usize>,
    pub kaci_opc: Option<usize>,

    pub lz_opc: f64,
    pub lz_factors_opc: usize,
    pub lz_norm_opc: f64,
    pub pe_opc: f64,
}

impl TractMetrics {
    pub fn compute(tract: &Tract, cfg: &MetricsConfig) -> Self {
        let optical = &tract.optical;
        let textured = &tract.textured;
        let lz = lempel_ziv_scan(&textured.opc);

        Self {
            tract_id: tract.id.clone(),
            batch: tract.batch,
            length_mm: tract.length_mm,
            region: tract.region,

            v_mean: optical.v.mean(),
            t_mean: optical.t.mean(),
            opc_mean: optical.opc.mean(),

            dea_v: dea(&optical.v, cfg.detrend),
            dea_t: dea(&optical.t, cfg.detrend),
            dea_opc: dea(&optical.opc, cfg.detrend),

            kaci_v: kaci(&textured.v, cfg.mse_frac, cfg.max_knots),
            kaci_t: kaci(&textured.t, cfg.mse_frac, cfg.max_knots),
            kaci_opc: kaci(&textured.opc, cfg.mse_frac, cfg.max_knots),

            lz_opc: lz.ratio,
            lz_factors_opc: lz.n_factors,
            lz_norm_opc: lz.normalized,
            pe_opc: permutation_entropy(&textured.opc, cfg.pe_order, cfg.pe_delay),
        }
    }
}

/// Numeric columns of the metrics table that enter the statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Length,
    VMean,
    TMean,
    OpcMean,
    DeaV,
    DeaT,
    DeaOpc,
    KaciV,
    KaciT,
    KaciOpc,
    LzNormOpc,
    PeOpc,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::Length,
        Column::VMean,
        Column::TMean,
        Column::OpcMean,
        Column::DeaV,
        Column::DeaT,
        Column::DeaOpc,
        Column::KaciV,
        Column::KaciT,
        Column::KaciOpc,
        Column::LzNormOpc,
        Column::PeOpc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Length => "length",
            Column::VMean => "V_mean",
            Column::TMean => "T_mean",
            Column::OpcMean => "OPC_mean",
            Column::DeaV => "DEA_V",
            Column::DeaT => "DEA_T",
            Column::DeaOpc => "DEA_OPC",
            Column::KaciV => "KACI_V",
            Column::KaciT => "KACI_T",
            Column::KaciOpc => "KACI_OPC",
            Column::LzNormOpc => "LZ_norm_OPC",
            Column::PeOpc => "PE_OPC",
        }
    }

    /// Value of this column for a row; `None` when undefined.
    pub fn get(&self, row: &TractMetrics) -> Option<f64> {
        let val = match self {
            Column::Length => Some(row.length_mm),
            Column::VMean => Some(row.v_mean),
            Column::TMean => Some(row.t_mean),
            Column::OpcMean => Some(row.opc_mean),
            Column::DeaV => row.dea_v,
            Column::DeaT => row.dea_t,
            Column::DeaOpc => row.dea_opc,
            Column::KaciV => row.kaci_v.map(|k| k as f64),
            Column::KaciT => row.kaci_t.map(|k| k as f64),
            Column::KaciOpc => row.kaci_opc.map(|k| k as f64),
            Column::LzNormOpc => Some(row.lz_norm_opc),
            Column::PeOpc => Some(row.pe_opc),
        };
        val.filter(|v| v.is_finite())
    }

    /// Defined values of this column over `rows`.
    pub fn values<'a, I>(&self, rows: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a TractMetrics>,
    {
        rows.into_iter().filter_map(|row| self.get(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProfileConfig, TractsConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn tract(seed: u64) -> Tract {
        let tracts = TractsConfig {
            n_tracts: 1,
            n_points: 100,
            length_min: 10.0,
            length_max: 80.0,
        };
        let mut rng = ChaCha12Rng::seed_from_u64(seed);
        Tract::generate(0, 0, &tracts, &ProfileConfig::default(), &mut rng).unwrap()
    }

    #[test]
    fn metrics_are_defined_for_default_profiles() {
        let cfg = MetricsConfig::default();
        for seed in 0..3 {
            let row = TractMetrics::compute(&tract(seed), &cfg);
            assert!(row.dea_opc.is_some());
            let k = row.kaci_opc.unwrap();
            assert!((4..=cfg.max_knots).contains(&k));
            assert_eq!(row.lz_opc, 1.0);
            assert!(row.lz_factors_opc >= 2);
            assert!(row.pe_opc > 0.0);
        }
    }

    #[test]
    fn metrics_are_deterministic() {
        let cfg = MetricsConfig::default();
        let t = tract(9);
        assert_eq!(TractMetrics::compute(&t, &cfg), TractMetrics::compute(&t, &cfg));
    }

    #[test]
    fn short_profiles_give_undefined_metrics() {
        let tracts = TractsConfig {
            n_tracts: 1,
            n_points: 10,
            length_min: 10.0,
            length_max: 80.0,
        };
        let shape = ProfileConfig {
            n_points: 5,
            n_spikes: 1,
            ..ProfileConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let t = Tract::generate(0, 0, &tracts, &shape, &mut rng).unwrap();
        let row = TractMetrics::compute(&t, &MetricsConfig::default());
        assert_eq!(row.dea_v, None);
        assert_eq!(row.kaci_opc, None);
        assert_eq!(Column::KaciOpc.get(&row), None);
        assert_eq!(Column::Length.get(&row), Some(t.length_mm));
    }
}
