// src/bin/check_controls.rs
//
// Cross-checks the files a preprocessing run wrote: meta totals against the
// TAZ totals they were summed from, and (optionally) TAZ populations against
// the forecast population table.
use anyhow::{bail, Result};
use clap::Parser;
use popsyn_forecast::{check::check_outputs, meta::MetaGrouping, Configuration};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Verify forecast control files are consistent")]
struct Args {
    /// JSON configuration the run used; file names and grouping come from it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Forecast population table to compare TAZ populations against.
    #[arg(long)]
    population: Option<PathBuf>,
    /// Grouping used for a full-schema meta file.
    #[arg(long)]
    grouping: Option<MetaGrouping>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output_directory = dir;
    }
    if let Some(grouping) = args.grouping {
        config.meta_grouping = grouping;
    }

    let report = check_outputs(&config, args.population.as_deref())?;
    if !report.is_consistent() {
        bail!("{} inconsistencies found", report.problems.len());
    }
    info!(
        zones = report.zones,
        meta = report.meta_records,
        "controls are consistent"
    );
    Ok(())
}
