// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::{
    forecast::DEFAULT_MIN_BASE_POPULATION,
    meta::{MetaGrouping, MetaSchema},
    output::write_json_atomically,
};

/// Relative file names, resolved against the configured directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    /// Under `input_directory`.
    pub zones: PathBuf,
    /// Under `input_directory`.
    pub base_year_controls: PathBuf,
    /// Under `scenario_directory`.
    pub forecast_population: PathBuf,
    pub taz_controls: PathBuf,
    pub maz_controls: PathBuf,
    pub meta_controls: PathBuf,
    pub summary: PathBuf,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            zones: Path::new("BaseYearData").join("Zones.csv"),
            base_year_controls: Path::new("BaseYearData").join("taz_controls.csv"),
            forecast_population: PathBuf::from("Population.csv"),
            taz_controls: PathBuf::from("taz_controls.csv"),
            maz_controls: PathBuf::from("maz_controls.csv"),
            meta_controls: PathBuf::from("meta_controls.csv"),
            summary: PathBuf::from("forecast_summary.json"),
        }
    }
}

/// Everything a preprocessing run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub scenario_directory: PathBuf,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub min_base_population: f64,
    pub meta_schema: MetaSchema,
    pub meta_grouping: MetaGrouping,
    pub files: FileNames,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            scenario_directory: PathBuf::from("scenario"),
            input_directory: PathBuf::from("input"),
            output_directory: PathBuf::from("output"),
            min_base_population: DEFAULT_MIN_BASE_POPULATION,
            meta_schema: MetaSchema::default(),
            meta_grouping: MetaGrouping::default(),
            files: FileNames::default(),
        }
    }
}

impl Configuration {
    /// Read a JSON configuration; omitted fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "configuration not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomically(path, self)
            .with_context(|| format!("saving configuration {}", path.display()))
    }

    pub fn zones_path(&self) -> PathBuf {
        self.input_directory.join(&self.files.zones)
    }

    pub fn base_year_controls_path(&self) -> PathBuf {
        self.input_directory.join(&self.files.base_year_controls)
    }

    pub fn forecast_population_path(&self) -> PathBuf {
        self.scenario_directory.join(&self.files.forecast_population)
    }

    pub fn taz_controls_path(&self) -> PathBuf {
        self.output_directory.join(&self.files.taz_controls)
    }

    pub fn maz_controls_path(&self) -> PathBuf {
        self.output_directory.join(&self.files.maz_controls)
    }

    pub fn meta_controls_path(&self) -> PathBuf {
        self.output_directory.join(&self.files.meta_controls)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_directory.join(&self.files.summary)
    }
}
