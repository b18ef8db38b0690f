// src/meta/mod.rs
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};
use tracing::{info, instrument};

use crate::{
    controls::{ControlRecord, ControlSchema},
    error::{ControlError, ControlResult},
    output::write_csv_atomically,
};

/// Column layout of the meta control file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaSchema {
    /// `region,puma,totalhh,totpop,<additional...>`
    #[default]
    Full,
    /// `PUMA,totalhh,totpop` (or `REGION,...`), no additional controls.
    Reduced,
}

/// Key the forecast zone records are summed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaGrouping {
    #[default]
    Puma,
    Region,
}

impl FromStr for MetaSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(MetaSchema::Full),
            "reduced" => Ok(MetaSchema::Reduced),
            other => Err(format!("unknown meta schema `{other}` (expected full or reduced)")),
        }
    }
}

impl FromStr for MetaGrouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "puma" => Ok(MetaGrouping::Puma),
            "region" => Ok(MetaGrouping::Region),
            other => Err(format!("unknown meta grouping `{other}` (expected puma or region)")),
        }
    }
}

impl fmt::Display for MetaSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetaSchema::Full => "full",
            MetaSchema::Reduced => "reduced",
        })
    }
}

impl fmt::Display for MetaGrouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetaGrouping::Puma => "puma",
            MetaGrouping::Region => "region",
        })
    }
}

impl MetaGrouping {
    fn key(self, record: &ControlRecord) -> i32 {
        match self {
            MetaGrouping::Puma => record.puma,
            MetaGrouping::Region => record.region,
        }
    }
}

/// Summed controls for one PUMA or region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaControlRecord {
    pub region: i32,
    pub puma: i32,
    pub total_households: i64,
    pub total_population: i64,
    pub additional_controls: Vec<i64>,
}

impl MetaControlRecord {
    fn key(&self, grouping: MetaGrouping) -> i32 {
        match grouping {
            MetaGrouping::Puma => self.puma,
            MetaGrouping::Region => self.region,
        }
    }
}

/// Sum forecast zone records by `grouping`, ascending by key.
///
/// The non-key identifier comes from the first record of each group.
pub fn create_from(
    records: &[ControlRecord],
    schema: &ControlSchema,
    grouping: MetaGrouping,
) -> Vec<MetaControlRecord> {
    let mut groups: BTreeMap<i32, MetaControlRecord> = BTreeMap::new();
    for record in records {
        let meta = groups
            .entry(grouping.key(record))
            .or_insert_with(|| MetaControlRecord {
                region: record.region,
                puma: record.puma,
                total_households: 0,
                total_population: 0,
                additional_controls: vec![0; schema.additional_len()],
            });
        meta.total_households += record.total_households;
        meta.total_population += record.total_population;
        if meta.additional_controls.len() < record.additional_controls.len() {
            meta.additional_controls
                .resize(record.additional_controls.len(), 0);
        }
        for (sum, value) in meta
            .additional_controls
            .iter_mut()
            .zip(&record.additional_controls)
        {
            *sum += value;
        }
    }
    groups.into_values().collect()
}

/// Write meta records in the requested layout.
#[instrument(level = "info", skip(path, records, schema), fields(path = %path.display()))]
pub fn write_meta(
    path: &Path,
    records: &[MetaControlRecord],
    schema: &ControlSchema,
    meta_schema: MetaSchema,
    grouping: MetaGrouping,
) -> ControlResult<()> {
    let source_name = path.display().to_string();
    let csv_err = |e| ControlError::csv(&source_name, e);

    write_csv_atomically(path, |out| {
        match meta_schema {
            MetaSchema::Full => {
                let header = ["region", "puma", "totalhh", "totpop"]
                    .into_iter()
                    .chain(schema.additional_headers.iter().map(String::as_str));
                out.write_record(header).map_err(csv_err)?;
                for meta in records {
                    let fields = [meta.region, meta.puma]
                        .into_iter()
                        .map(i64::from)
                        .chain([meta.total_households, meta.total_population])
                        .chain(meta.additional_controls.iter().copied())
                        .map(|v| v.to_string());
                    out.write_record(fields).map_err(csv_err)?;
                }
            }
            MetaSchema::Reduced => {
                let key = match grouping {
                    MetaGrouping::Puma => "PUMA",
                    MetaGrouping::Region => "REGION",
                };
                out.write_record([key, "totalhh", "totpop"])
                    .map_err(csv_err)?;
                for meta in records {
                    out.write_record([
                        meta.key(grouping).to_string(),
                        meta.total_households.to_string(),
                        meta.total_population.to_string(),
                    ])
                    .map_err(csv_err)?;
                }
            }
        }
        Ok(())
    })?;

    info!(records = records.len(), %meta_schema, %grouping, "wrote meta controls");
    Ok(())
}
