// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, scaling or writing control totals.
///
/// Every variant is fatal for the run: these are pure data transforms, so
/// nothing here is retried. The caller decides how to surface them.
#[derive(Error, Debug)]
pub enum ControlError {
    /// A data row did not have the number of columns its header declares.
    #[error("{source_name}: line {line} has {found} columns, expected {expected}")]
    MalformedInputRow {
        source_name: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A field that must be numeric could not be parsed.
    #[error("{source_name}: line {line}, column `{column}`: `{value}` is not a valid number")]
    InvalidNumber {
        source_name: String,
        line: u64,
        column: String,
        value: String,
    },

    /// The input had no header row at all.
    #[error("{source_name}: missing header row")]
    MissingHeader { source_name: String },

    /// A control record refers to a TAZ the zone system does not know.
    #[error("TAZ {taz} is not part of the zone system")]
    UnknownZone { taz: i32 },

    /// The forecast population table has no entry for a zone.
    #[error("no forecast population for TAZ {taz}")]
    MissingForecastEntry { taz: i32 },

    /// A zone needed the PUMA fallback but its PUMA has no average record.
    #[error("TAZ {taz} falls back to PUMA {puma}, which has no base-year records")]
    UnknownPuma { taz: i32, puma: i32 },

    /// A scale factor would have divided by a zero population.
    #[error("TAZ {taz}: cannot scale by a zero {denominator} population")]
    DivisionByZero { taz: i32, denominator: &'static str },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {source_name}: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },
}

impl ControlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ControlError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(source_name: impl Into<String>, source: csv::Error) -> Self {
        ControlError::Csv {
            source_name: source_name.into(),
            source,
        }
    }
}

pub type ControlResult<T> = std::result::Result<T, ControlError>;
