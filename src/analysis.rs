use crate::config::{AnalysisConfig, Config};
use crate::engine::Batch;
use crate::metrics::{Column, TractMetrics};
use crate::model::Region;
use crate::numeric::median;
use crate::stats::{
    Accumulator, AccumulatorReport, ConfidenceInterval, Summary, TestResult, cohens_d,
    confidence_interval, one_way_anova, pearson, summarize, t_test_ind,
};
use anyhow::{Context, Result};
use std::{collections::BTreeMap, path::Path};

/// Columns compared across groups.
pub const GROUP_COLUMNS: [Column; 5] = [
    Column::VMean,
    Column::TMean,
    Column::OpcMean,
    Column::DeaOpc,
    Column::KaciOpc,
];

/// Columns tested between short and long tracts and across regions.
pub const TEST_COLUMNS: [Column; 3] = [Column::VMean, Column::TMean, Column::OpcMean];

/// Columns with confidence intervals and pairwise correlations.
pub const CI_COLUMNS: [Column; 6] = [
    Column::VMean,
    Column::TMean,
    Column::OpcMean,
    Column::DeaOpc,
    Column::KaciOpc,
    Column::Length,
];

/// Collects tract metrics batch by batch.
pub struct Analyzer {
    cfg: Config,
    rows: Vec<TractMetrics>,
    n_batches: usize,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            rows: Vec::new(),
            n_batches: 0,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let batch = Batch::load(file).with_context(|| format!("failed to load {file:?}"))?;
        self.add_batch(&batch);
        Ok(())
    }

    pub fn add_batch(&mut self, batch: &Batch) {
        let n_tracts = batch.tracts.len();
        for (i_tract, tract) in batch.tracts.iter().enumerate() {
            self.rows
                .push(TractMetrics::compute(tract, &self.cfg.metrics));

            if (i_tract + 1) % 100 == 0 || i_tract + 1 == n_tracts {
                let progress = 100.0 * (i_tract + 1) as f64 / n_tracts as f64;
                log::info!("batch {:04}: analyzed {progress:06.2}%", batch.index);
            }
        }
        self.n_batches += 1;
    }

    pub fn rows(&self) -> &[TractMetrics] {
        &self.rows
    }

    pub fn analyze(&self) -> Analysis {
        Analysis::new(&self.rows, self.n_batches, &self.cfg.analysis)
    }
}

/// Mean and standard deviation of [`GROUP_COLUMNS`] within one group.
#[derive(Debug, Clone)]
pub struct GroupStats {
    pub label: String,
    pub n_tracts: usize,
    pub reports: Vec<AccumulatorReport>,
}

fn group_stats<K, F>(rows: &[TractMetrics], key: F) -> Vec<GroupStats>
where
    K: Ord + ToString,
    F: Fn(usize, &TractMetrics) -> K,
{
    let mut groups: BTreeMap<K, (usize, Vec<Accumulator>)> = BTreeMap::new();
    for (i_row, row) in rows.iter().enumerate() {
        let (n_tracts, acc_vec) = groups
            .entry(key(i_row, row))
            .or_insert_with(|| (0, vec![Accumulator::new(); GROUP_COLUMNS.len()]));
        *n_tracts += 1;
        for (col, acc) in GROUP_COLUMNS.iter().zip(acc_vec.iter_mut()) {
            if let Some(val) = col.get(row) {
                acc.add(val);
            }
        }
    }
    groups
        .into_iter()
        .map(|(key, (n_tracts, acc_vec))| GroupStats {
            label: key.to_string(),
            n_tracts,
            reports: acc_vec.iter().map(Accumulator::report).collect(),
        })
        .collect()
}

/// Equal-width length terciles over the observed range, labelled with the
/// region names. Bins are closed on the right.
pub fn length_terciles(lengths: &[f64]) -> Vec<Region> {
    let (min, max) = crate::numeric::min_max(lengths);
    let width = (max - min) / 3.0;
    lengths
        .iter()
        .map(|&len| {
            if !(width > 0.0) {
                return Region::Medium;
            }
            let bin = ((len - min) / width).ceil() as i64 - 1;
            Region::ALL[bin.clamp(0, 2) as usize]
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemyelRow {
    pub tract_id: String,
    pub t_original: f64,
    pub t_demyel: f64,
    pub opc_original: f64,
    pub opc_demyel: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemyelComparison {
    pub factor: f64,
    pub t_original: f64,
    pub t_demyel: f64,
    pub opc_original: f64,
    pub opc_demyel: f64,
}

impl DemyelComparison {
    /// Percentage reduction of transmission and OPC.
    pub fn reduction(&self) -> f64 {
        (1.0 - self.factor) * 100.0
    }
}

/// Simulated demyelination: transmission and OPC scaled by `factor`.
pub fn demyelinate(rows: &[TractMetrics], factor: f64) -> (Vec<DemyelRow>, DemyelComparison) {
    let demyel_rows: Vec<DemyelRow> = rows
        .iter()
        .map(|row| DemyelRow {
            tract_id: row.tract_id.clone(),
            t_original: row.t_mean,
            t_demyel: row.t_mean * factor,
            opc_original: row.opc_mean,
            opc_demyel: row.opc_mean * factor,
        })
        .collect();

    let mean_of = |f: fn(&DemyelRow) -> f64| {
        crate::numeric::mean(&demyel_rows.iter().map(f).collect::<Vec<_>>())
    };
    let comparison = DemyelComparison {
        factor,
        t_original: mean_of(|r| r.t_original),
        t_demyel: mean_of(|r| r.t_demyel),
        opc_original: mean_of(|r| r.opc_original),
        opc_demyel: mean_of(|r| r.opc_demyel),
    };
    (demyel_rows, comparison)
}

#[derive(Debug, Clone)]
pub struct Correlation {
    pub a: Column,
    pub b: Column,
    pub result: TestResult,
}

/// Short-versus-long comparison split at the median length.
#[derive(Debug, Clone)]
pub struct LengthSplit {
    pub median_length: f64,
    pub n_short: usize,
    pub n_long: usize,
    pub t_tests: Vec<(Column, TestResult)>,
    pub effect_sizes: Vec<(Column, f64)>,
}

impl LengthSplit {
    fn new(rows: &[TractMetrics]) -> Self {
        let lengths: Vec<f64> = rows.iter().map(|row| row.length_mm).collect();
        let median_length = median(&lengths);
        let (short, long): (Vec<&TractMetrics>, Vec<&TractMetrics>) =
            rows.iter().partition(|row| row.length_mm < median_length);

        let mut t_tests = Vec::new();
        let mut effect_sizes = Vec::new();
        for col in TEST_COLUMNS {
            let a = col.values(short.iter().copied());
            let b = col.values(long.iter().copied());
            if let Some(res) = t_test_ind(&a, &b) {
                t_tests.push((col, res));
            }
            if let Some(d) = cohens_d(&a, &b) {
                effect_sizes.push((col, d));
            }
        }

        Self {
            median_length,
            n_short: short.len(),
            n_long: long.len(),
            t_tests,
            effect_sizes,
        }
    }
}

/// Everything the report shows.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub n_tracts: usize,
    pub n_batches: usize,
    pub n_regions: usize,
    pub confidence: f64,
    pub summaries: Vec<(Column, Summary)>,
    pub by_region: Vec<GroupStats>,
    pub by_length: Vec<GroupStats>,
    pub by_batch: Vec<GroupStats>,
    pub demyel_rows: Vec<DemyelRow>,
    pub demyel: DemyelComparison,
    pub intervals: Vec<(Column, ConfidenceInterval)>,
    pub length_split: LengthSplit,
    pub anova: Vec<(Column, TestResult)>,
    pub correlations: Vec<Correlation>,
}

impl Analysis {
    pub fn new(rows: &[TractMetrics], n_batches: usize, cfg: &AnalysisConfig) -> Self {
        let summaries = Column::ALL
            .iter()
            .map(|&col| (col, summarize(&col.values(rows))))
            .collect();

        let lengths: Vec<f64> = rows.iter().map(|row| row.length_mm).collect();
        let terciles = length_terciles(&lengths);

        let by_region = group_stats(rows, |_, row| row.region);
        let by_length = group_stats(rows, |i_row, _| terciles[i_row]);
        let by_batch = group_stats(rows, |_, row| format!("batch-{:04}", row.batch));

        let (demyel_rows, demyel) = demyelinate(rows, cfg.demyel_factor);

        let intervals = CI_COLUMNS
            .iter()
            .filter_map(|&col| {
                confidence_interval(&col.values(rows), cfg.confidence).map(|ci| (col, ci))
            })
            .collect();

        let anova = TEST_COLUMNS
            .iter()
            .filter_map(|&col| {
                let groups: Vec<Vec<f64>> = Region::ALL
                    .iter()
                    .map(|&region| col.values(rows.iter().filter(|row| row.region == region)))
                    .collect();
                let groups: Vec<&[f64]> = groups.iter().map(Vec::as_slice).collect();
                one_way_anova(&groups).map(|res| (col, res))
            })
            .collect();

        let mut correlations = Vec::new();
        for (i_a, &a) in CI_COLUMNS.iter().enumerate() {
            for &b in &CI_COLUMNS[i_a + 1..] {
                let (xs, ys): (Vec<f64>, Vec<f64>) = rows
                    .iter()
                    .filter_map(|row| Some((a.get(row)?, b.get(row)?)))
                    .unzip();
                if let Some(result) = pearson(&xs, &ys) {
                    correlations.push(Correlation { a, b, result });
                }
            }
        }

        let mut regions: Vec<Region> = rows.iter().map(|row| row.region).collect();
        regions.sort();
        regions.dedup();

        Self {
            n_tracts: rows.len(),
            n_batches,
            n_regions: regions.len(),
            confidence: cfg.confidence,
            summaries,
            by_region,
            by_length,
            by_batch,
            demyel_rows,
            demyel,
            intervals,
            length_split: LengthSplit::new(rows),
            anova,
            correlations,
        }
    }
}
