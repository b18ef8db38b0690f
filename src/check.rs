// src/check.rs
//
// Read back the files a preprocessing run wrote and cross-check them.
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{info, instrument, warn};

use crate::{
    config::Configuration,
    controls::{ControlRecord, ControlTable},
    csv_utils::{read_rows_from_path, split_header},
    forecast::ForecastPopulation,
    meta::MetaGrouping,
};

/// Households and population per grouping key.
pub type Totals = BTreeMap<i32, (i64, i64)>;

/// Outcome of [`check_outputs`]; `problems` is empty when everything agrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub zones: usize,
    pub meta_records: usize,
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Read a meta control file in either layout.
///
/// Reduced files name their key column (`PUMA` / `REGION`); full files start
/// with `region,puma` and need `grouping` to know which one is the key.
pub fn read_meta_totals(path: &Path, grouping: MetaGrouping) -> Result<Totals> {
    let source_name = path.display().to_string();
    let rows = read_rows_from_path(path)?;
    let (header, data) = split_header(rows, &source_name)?;

    let (key_col, hh_col, pop_col) = match header.fields.get(0) {
        Some("PUMA") | Some("REGION") => (0, 1, 2),
        Some("region") => match grouping {
            MetaGrouping::Puma => (1, 2, 3),
            MetaGrouping::Region => (0, 2, 3),
        },
        other => bail!("{}: unrecognised meta header {:?}", source_name, other),
    };

    let mut totals = Totals::new();
    for row in &data {
        let key: i32 = row.parse(key_col, "key", &source_name)?;
        let hh: i64 = row.parse(hh_col, "totalhh", &source_name)?;
        let pop: i64 = row.parse(pop_col, "totpop", &source_name)?;
        totals.insert(key, (hh, pop));
    }
    Ok(totals)
}

/// Sum zone records by `grouping`.
pub fn expected_totals(records: &[ControlRecord], grouping: MetaGrouping) -> Totals {
    let mut totals = Totals::new();
    for r in records {
        let key = match grouping {
            MetaGrouping::Puma => r.puma,
            MetaGrouping::Region => r.region,
        };
        let entry = totals.entry(key).or_default();
        entry.0 += r.total_households;
        entry.1 += r.total_population;
    }
    totals
}

/// Differences between meta totals and the zone sums they should equal.
pub fn meta_mismatches(meta: &Totals, expected: &Totals) -> Vec<String> {
    let mut problems: Vec<String> = expected
        .iter()
        .filter(|(key, want)| meta.get(*key) != Some(*want))
        .map(|(key, want)| format!("key {}: meta {:?}, zones sum to {:?}", key, meta.get(key), want))
        .collect();
    problems.extend(
        meta.keys()
            .filter(|k| !expected.contains_key(*k))
            .map(|key| format!("key {}: meta record has no zone records", key)),
    );
    problems
}

/// Zones whose population is more than one person off the forecast.
pub fn population_mismatches(
    records: &[ControlRecord],
    population: &ForecastPopulation,
) -> Result<Vec<String>> {
    let mismatches = records
        .par_iter()
        .map(|r| -> Result<Option<String>> {
            let target = population.target(r.taz)?;
            if (r.total_population as f64 - target).abs() > 1.0 {
                Ok(Some(format!(
                    "TAZ {}: totpop {} vs forecast {}",
                    r.taz, r.total_population, target
                )))
            } else {
                Ok(None)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(mismatches.into_iter().flatten().collect())
}

/// Check the outputs named by `config`, optionally against a population table.
#[instrument(level = "info", skip_all, fields(output = %config.output_directory.display()))]
pub fn check_outputs(config: &Configuration, population: Option<&Path>) -> Result<CheckReport> {
    // 1) TAZ controls, and the MAZ copy must match byte for byte
    let taz_path = config.taz_controls_path();
    let maz_path = config.maz_controls_path();
    let taz = ControlTable::load(&taz_path)
        .with_context(|| format!("loading {}", taz_path.display()))?;
    let mut problems = Vec::new();
    let taz_bytes = fs::read(&taz_path).with_context(|| format!("reading {}", taz_path.display()))?;
    let maz_bytes = fs::read(&maz_path).with_context(|| format!("reading {}", maz_path.display()))?;
    if taz_bytes != maz_bytes {
        problems.push(format!("{} differs from {}", maz_path.display(), taz_path.display()));
    }

    // 2) meta totals equal the sums of TAZ totals
    let meta_path = config.meta_controls_path();
    let meta = read_meta_totals(&meta_path, config.meta_grouping)
        .with_context(|| format!("reading meta controls {}", meta_path.display()))?;
    problems.extend(meta_mismatches(
        &meta,
        &expected_totals(&taz.records, config.meta_grouping),
    ));

    // 3) TAZ populations within rounding of the forecast
    if let Some(path) = population {
        let population = ForecastPopulation::load(path)?;
        problems.extend(population_mismatches(&taz.records, &population)?);
    }

    for p in &problems {
        warn!("{}", p);
    }
    info!(zones = taz.records.len(), meta = meta.len(), problems = problems.len(), "checked controls");
    Ok(CheckReport {
        zones: taz.records.len(),
        meta_records: meta.len(),
        problems,
    })
}
