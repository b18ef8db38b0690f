use std::{collections::HashMap, path::Path};
use tracing::{info, instrument};

use crate::{
    csv_utils::{read_rows_from_lines, read_rows_from_path, split_header, Row},
    error::{ControlError, ControlResult},
};

/// Forecast-year population by TAZ, read from a `TAZ,Population` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastPopulation {
    by_taz: HashMap<i32, f64>,
}

impl ForecastPopulation {
    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> ControlResult<Self> {
        let rows = read_rows_from_path(path)?;
        let population = Self::from_rows(rows, &path.display().to_string())?;
        info!(zones = population.len(), "loaded forecast population");
        Ok(population)
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> ControlResult<Self> {
        let rows = read_rows_from_lines(lines, "population lines")?;
        Self::from_rows(rows, "population lines")
    }

    fn from_rows(rows: Vec<Row>, source_name: &str) -> ControlResult<Self> {
        let (header, data) = split_header(rows, source_name)?;
        let width = header.len().max(2);
        let mut by_taz = HashMap::with_capacity(data.len());
        for row in &data {
            if row.len() != width {
                return Err(ControlError::MalformedInputRow {
                    source_name: source_name.to_string(),
                    line: row.line,
                    expected: width,
                    found: row.len(),
                });
            }
            let taz: i32 = row.parse(0, "TAZ", source_name)?;
            let population: f64 = row.parse(1, "Population", source_name)?;
            if !population.is_finite() {
                return Err(ControlError::InvalidNumber {
                    source_name: source_name.to_string(),
                    line: row.line,
                    column: "Population".to_string(),
                    value: row.fields[1].to_string(),
                });
            }
            by_taz.insert(taz, population);
        }
        Ok(Self { by_taz })
    }

    /// Target population for `taz`; a missing entry is an input error.
    pub fn target(&self, taz: i32) -> ControlResult<f64> {
        self.by_taz
            .get(&taz)
            .copied()
            .ok_or(ControlError::MissingForecastEntry { taz })
    }

    pub fn len(&self) -> usize {
        self.by_taz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_taz.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.by_taz.values().sum()
    }
}

impl FromIterator<(i32, f64)> for ForecastPopulation {
    fn from_iter<I: IntoIterator<Item = (i32, f64)>>(iter: I) -> Self {
        Self {
            by_taz: iter.into_iter().collect(),
        }
    }
}
