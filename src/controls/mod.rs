// src/controls/mod.rs
use std::path::Path;
use tracing::{debug, instrument};

use crate::{
    csv_utils::{read_rows_from_lines, read_rows_from_path, split_header, Row},
    error::{ControlError, ControlResult},
    output::{write_csv_atomically, CsvOut},
};

pub mod puma;
pub mod scale;

pub use puma::compute_averages;
pub use scale::{scale, Scalable};

/// Columns every control file starts with, in order.
pub const FIXED_COLUMNS: [&str; 6] = ["region", "puma", "taz", "maz", "totalhh", "totpop"];

/// Region/TAZ value carried by synthetic (PUMA-average) records.
pub const SYNTHETIC_ID: i32 = -1;

/// The variable tail of a control file: names of the columns after `totpop`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSchema {
    pub additional_headers: Vec<String>,
}

impl ControlSchema {
    pub fn new(additional_headers: Vec<String>) -> Self {
        Self { additional_headers }
    }

    /// Schema of a header row: every column past the fixed six.
    pub fn from_header(header: &Row) -> Self {
        Self::new(
            header
                .fields
                .iter()
                .skip(FIXED_COLUMNS.len())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn additional_len(&self) -> usize {
        self.additional_headers.len()
    }

    pub fn column_count(&self) -> usize {
        FIXED_COLUMNS.len() + self.additional_len()
    }

    /// Header line for a TAZ/MAZ control file.
    pub fn header(&self) -> Vec<&str> {
        FIXED_COLUMNS
            .iter()
            .copied()
            .chain(self.additional_headers.iter().map(String::as_str))
            .collect()
    }
}

/// Control totals for one zone, or a PUMA average when `taz == SYNTHETIC_ID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRecord {
    pub region: i32,
    pub puma: i32,
    pub taz: i32,
    pub total_households: i64,
    pub total_population: i64,
    pub additional_controls: Vec<i64>,
}

impl ControlRecord {
    pub fn is_synthetic(&self) -> bool {
        self.taz == SYNTHETIC_ID && self.region == SYNTHETIC_ID
    }

    /// Every numeric column after the identifiers, households first.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        [self.total_households, self.total_population]
            .into_iter()
            .chain(self.additional_controls.iter().copied())
    }

    fn from_row(row: &Row, schema: &ControlSchema, source_name: &str) -> ControlResult<Self> {
        if row.len() != schema.column_count() {
            return Err(ControlError::MalformedInputRow {
                source_name: source_name.to_string(),
                line: row.line,
                expected: schema.column_count(),
                found: row.len(),
            });
        }
        // maz must be numeric but is regenerated from taz on write
        row.parse::<i32>(3, "maz", source_name)?;
        let additional_controls = schema
            .additional_headers
            .iter()
            .enumerate()
            .map(|(i, name)| row.parse::<i64>(FIXED_COLUMNS.len() + i, name, source_name))
            .collect::<ControlResult<Vec<_>>>()?;
        Ok(Self {
            region: row.parse(0, "region", source_name)?,
            puma: row.parse(1, "puma", source_name)?,
            taz: row.parse(2, "taz", source_name)?,
            total_households: row.parse(4, "totalhh", source_name)?,
            total_population: row.parse(5, "totpop", source_name)?,
            additional_controls,
        })
    }

    fn write(&self, out: &mut CsvOut, source_name: &str) -> ControlResult<()> {
        let ids = [self.region, self.puma, self.taz, self.taz].map(|v| v.to_string());
        let fields = ids
            .into_iter()
            .chain(self.values().map(|v| v.to_string()));
        out.write_record(fields)
            .map_err(|e| ControlError::csv(source_name, e))
    }
}

/// A loaded control file: its schema plus one record per data row, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlTable {
    pub schema: ControlSchema,
    pub records: Vec<ControlRecord>,
}

impl ControlTable {
    /// Parse a control file given as lines; line 0 is the header.
    pub fn load_from_lines<S: AsRef<str>>(lines: &[S]) -> ControlResult<Self> {
        let rows = read_rows_from_lines(lines, "control lines")?;
        Self::from_rows(rows, "control lines")
    }

    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> ControlResult<Self> {
        let rows = read_rows_from_path(path)?;
        Self::from_rows(rows, &path.display().to_string())
    }

    fn from_rows(rows: Vec<Row>, source_name: &str) -> ControlResult<Self> {
        let (header, data) = split_header(rows, source_name)?;
        let schema = ControlSchema::from_header(&header);
        if header.len() < FIXED_COLUMNS.len() {
            return Err(ControlError::MalformedInputRow {
                source_name: source_name.to_string(),
                line: header.line,
                expected: FIXED_COLUMNS.len(),
                found: header.len(),
            });
        }
        let records = data
            .iter()
            .map(|row| ControlRecord::from_row(row, &schema, source_name))
            .collect::<ControlResult<Vec<_>>>()?;
        debug!(
            records = records.len(),
            additional = schema.additional_len(),
            "loaded control records"
        );
        Ok(Self { schema, records })
    }

    /// Write the table as `region,puma,taz,maz,totalhh,totpop,<additional...>`.
    pub fn write(&self, path: &Path) -> ControlResult<()> {
        let source_name = path.display().to_string();
        write_csv_atomically(path, |out| {
            out.write_record(self.schema.header())
                .map_err(|e| ControlError::csv(&source_name, e))?;
            for record in &self.records {
                record.write(out, &source_name)?;
            }
            Ok(())
        })
    }
}
