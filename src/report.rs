use crate::analysis::{Analysis, DemyelRow, GROUP_COLUMNS, GroupStats};
use crate::metrics::TractMetrics;
use crate::stats::{effect_size_label, significance_stars};
use anyhow::{Context, Result};
use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

pub const METRICS_HEADER: [&str; 17] = [
    "tract_id",
    "batch",
    "length",
    "region",
    "V_mean",
    "T_mean",
    "OPC_mean",
    "DEA_V",
    "DEA_T",
    "DEA_OPC",
    "KACI_V",
    "KACI_T",
    "KACI_OPC",
    "LZ_OPC",
    "LZ_factors_OPC",
    "LZ_norm_OPC",
    "PE_OPC",
];

pub const DEMYEL_HEADER: [&str; 6] = [
    "tract_id",
    "T_original",
    "T_demyel",
    "OPC_original",
    "OPC_demyel",
    "demyel_factor",
];

/// Undefined values are written as empty cells.
fn cell<T: Display>(val: Option<T>) -> String {
    val.map(|v| v.to_string()).unwrap_or_default()
}

fn create_writer(file: &Path) -> Result<BufWriter<File>> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    Ok(BufWriter::new(file))
}

pub fn write_metrics_csv<W: Write>(rows: &[TractMetrics], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(METRICS_HEADER)?;
    for row in rows {
        writer.write_record([
            row.tract_id.clone(),
            row.batch.to_string(),
            row.length_mm.to_string(),
            row.region.to_string(),
            row.v_mean.to_string(),
            row.t_mean.to_string(),
            row.opc_mean.to_string(),
            cell(row.dea_v),
            cell(row.dea_t),
            cell(row.dea_opc),
            cell(row.kaci_v),
            cell(row.kaci_t),
            cell(row.kaci_opc),
            row.lz_opc.to_string(),
            row.lz_factors_opc.to_string(),
            row.lz_norm_opc.to_string(),
            row.pe_opc.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_demyelination_csv<W: Write>(
    rows: &[DemyelRow],
    factor: f64,
    out: W,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(DEMYEL_HEADER)?;
    for row in rows {
        writer.write_record([
            row.tract_id.clone(),
            row.t_original.to_string(),
            row.t_demyel.to_string(),
            row.opc_original.to_string(),
            row.opc_demyel.to_string(),
            factor.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_group_table<W: Write>(title: &str, groups: &[GroupStats], out: &mut W) -> Result<()> {
    writeln!(out, "## {title}\n")?;
    write!(out, "| group | n |")?;
    for col in GROUP_COLUMNS {
        write!(out, " {} |", col.name())?;
    }
    writeln!(out)?;
    writeln!(out, "|---|---|{}", "---|".repeat(GROUP_COLUMNS.len()))?;
    for group in groups {
        write!(out, "| {} | {} |", group.label, group.n_tracts)?;
        for report in &group.reports {
            write!(out, " {:.3} ± {:.3} |", report.mean, report.std_dev)?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    Ok(())
}

pub fn write_report<W: Write>(analysis: &Analysis, out: &mut W) -> Result<()> {
    writeln!(out, "# Optical connectome metrics\n")?;

    writeln!(out, "## Overview\n")?;
    writeln!(out, "- **Tracts**: {}", analysis.n_tracts)?;
    writeln!(out, "- **Batches**: {}", analysis.n_batches)?;
    writeln!(out, "- **Regions**: {}\n", analysis.n_regions)?;

    writeln!(out, "## Metric summary\n")?;
    writeln!(out, "| metric | count | mean | std | min | median | max |")?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for (col, s) in &analysis.summaries {
        writeln!(
            out,
            "| {} | {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} |",
            col.name(),
            s.count,
            s.mean,
            s.std_dev,
            s.min,
            s.median,
            s.max
        )?;
    }
    writeln!(out)?;

    write_group_table("By region", &analysis.by_region, out)?;
    write_group_table("By length tercile", &analysis.by_length, out)?;
    write_group_table("By batch", &analysis.by_batch, out)?;

    let demyel = &analysis.demyel;
    writeln!(out, "## Demyelination (factor {})\n", demyel.factor)?;
    writeln!(
        out,
        "- Transmission: {:.3} → {:.3} ({:.1}% reduction)",
        demyel.t_original,
        demyel.t_demyel,
        demyel.reduction()
    )?;
    writeln!(
        out,
        "- OPC: {:.3} → {:.3} ({:.1}% reduction)\n",
        demyel.opc_original,
        demyel.opc_demyel,
        demyel.reduction()
    )?;

    writeln!(
        out,
        "## Confidence intervals ({:.0}%)\n",
        100.0 * analysis.confidence
    )?;
    writeln!(out, "| metric | n | mean ± SD | interval | width |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for (col, ci) in &analysis.intervals {
        writeln!(
            out,
            "| {} | {} | {:.3} ± {:.3} | [{:.3}, {:.3}] | {:.3} |",
            col.name(),
            ci.n_vals,
            ci.mean,
            ci.std_dev,
            ci.lower,
            ci.upper,
            ci.width()
        )?;
    }
    writeln!(out)?;

    let split = &analysis.length_split;
    writeln!(out, "## Short vs long tracts\n")?;
    writeln!(
        out,
        "Split at median length {:.1} mm: {} short, {} long.\n",
        split.median_length, split.n_short, split.n_long
    )?;
    writeln!(out, "### t-tests\n")?;
    for (col, res) in &split.t_tests {
        writeln!(
            out,
            "- {}: t={:.3}, p={:.3} {}",
            col.name(),
            res.statistic,
            res.p_value,
            significance_stars(res.p_value)
        )?;
    }
    writeln!(out, "\n### Effect sizes (Cohen's d)\n")?;
    for (col, d) in &split.effect_sizes {
        writeln!(out, "- {}: d={:.3} ({})", col.name(), d, effect_size_label(*d))?;
    }
    writeln!(out)?;

    writeln!(out, "## ANOVA by region\n")?;
    for (col, res) in &analysis.anova {
        writeln!(
            out,
            "- {}: F={:.3}, p={:.3} {}",
            col.name(),
            res.statistic,
            res.p_value,
            significance_stars(res.p_value)
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Correlations\n")?;
    for corr in &analysis.correlations {
        writeln!(
            out,
            "- {} vs {}: r={:.3}, p={:.3} {}",
            corr.a.name(),
            corr.b.name(),
            corr.result.statistic,
            corr.result.p_value,
            significance_stars(corr.result.p_value)
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Significance levels\n")?;
    writeln!(out, "- `***` p < 0.001")?;
    writeln!(out, "- `**` p < 0.01")?;
    writeln!(out, "- `*` p < 0.05")?;
    writeln!(out, "- `ns` p ≥ 0.05")?;

    Ok(())
}

/// Write the metrics table, demyelination table and report.
pub fn save_all(
    rows: &[TractMetrics],
    analysis: &Analysis,
    metrics_file: &Path,
    demyel_file: &Path,
    report_file: &Path,
) -> Result<()> {
    let mut writer = create_writer(metrics_file)?;
    write_metrics_csv(rows, &mut writer).context("failed to write metrics table")?;
    writer.flush().context("failed to flush writer stream")?;
    log::info!("saved {metrics_file:?}");

    let mut writer = create_writer(demyel_file)?;
    write_demyelination_csv(&analysis.demyel_rows, analysis.demyel.factor, &mut writer)
        .context("failed to write demyelination table")?;
    writer.flush().context("failed to flush writer stream")?;
    log::info!("saved {demyel_file:?}");

    let mut writer = create_writer(report_file)?;
    write_report(analysis, &mut writer).context("failed to write report")?;
    writer.flush().context("failed to flush writer stream")?;
    log::info!("saved {report_file:?}");

    Ok(())
}
