// src/pipeline.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    config::Configuration,
    controls::ControlTable,
    forecast::{ForecastControlGenerator, ForecastPopulation},
    meta::{create_from, write_meta},
    output::write_json_atomically,
    report::Reporter,
    zones::ZoneSystem,
};

/// What a preprocessing run produced, written as `forecast_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub zones: usize,
    pub direct_scaled: usize,
    pub puma_fallback: usize,
    pub meta_records: usize,
    pub total_households: i64,
    pub total_population: i64,
}

/// Build the forecast TAZ, MAZ and meta control files for one scenario.
#[instrument(level = "info", skip_all, fields(output = %config.output_directory.display()))]
pub fn run_preprocessor(config: &Configuration, reporter: &dyn Reporter) -> Result<RunSummary> {
    let started_at = Utc::now();

    // ─── 1) load inputs ──────────────────────────────────────────────
    reporter.report("Loading zone system and base-year controls");
    let zones_path = config.zones_path();
    let zones = ZoneSystem::load(&zones_path)
        .with_context(|| format!("loading zone system {}", zones_path.display()))?;
    let base_path = config.base_year_controls_path();
    let base = ControlTable::load(&base_path)
        .with_context(|| format!("loading base-year controls {}", base_path.display()))?;
    let population_path = config.forecast_population_path();
    let population = ForecastPopulation::load(&population_path)
        .with_context(|| format!("loading forecast population {}", population_path.display()))?;

    // ─── 2) scale zones ──────────────────────────────────────────────
    reporter.report("Generating forecast zone controls");
    let forecast = ForecastControlGenerator::new(&zones, &population)
        .with_min_base_population(config.min_base_population)
        .generate(&base, reporter)
        .context("generating forecast controls")?;
    forecast
        .write(&config.taz_controls_path(), &config.maz_controls_path())
        .context("writing forecast zone controls")?;

    // ─── 3) meta controls ────────────────────────────────────────────
    reporter.report("Aggregating meta controls");
    let meta = create_from(&forecast.table.records, &forecast.table.schema, config.meta_grouping);
    write_meta(
        &config.meta_controls_path(),
        &meta,
        &forecast.table.schema,
        config.meta_schema,
        config.meta_grouping,
    )
    .context("writing meta controls")?;

    // ─── 4) summary ──────────────────────────────────────────────────
    let records = &forecast.table.records;
    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        zones: records.len(),
        direct_scaled: forecast.direct,
        puma_fallback: forecast.fallback,
        meta_records: meta.len(),
        total_households: records.iter().map(|r| r.total_households).sum(),
        total_population: records.iter().map(|r| r.total_population).sum(),
    };
    write_json_atomically(&config.summary_path(), &summary)?;

    info!(
        zones = summary.zones,
        households = summary.total_households,
        population = summary.total_population,
        "preprocessing complete"
    );
    reporter.report("Finished generating forecast controls");
    Ok(summary)
}
