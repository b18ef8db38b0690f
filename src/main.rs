// src/main.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use popsyn_forecast::{
    meta::{MetaGrouping, MetaSchema},
    report::TracingReporter,
    run_preprocessor, Configuration,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Scale base-year PopSyn zone controls to a forecast population"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate forecast TAZ, MAZ and meta control files.
    Run {
        /// JSON configuration; defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        input_dir: Option<PathBuf>,
        #[arg(long)]
        scenario_dir: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        min_base_population: Option<f64>,
        /// full | reduced
        #[arg(long)]
        meta_schema: Option<MetaSchema>,
        /// puma | region
        #[arg(long)]
        meta_grouping: Option<MetaGrouping>,
    },
    /// Write a configuration file filled with the defaults.
    InitConfig { path: PathBuf },
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    match args.command {
        Command::InitConfig { path } => {
            Configuration::default().save(&path)?;
            info!(path = %path.display(), "wrote default configuration");
        }
        Command::Run {
            config,
            input_dir,
            scenario_dir,
            output_dir,
            min_base_population,
            meta_schema,
            meta_grouping,
        } => {
            // ─── 2) resolve configuration ────────────────────────────
            let mut configuration = match &config {
                Some(path) => Configuration::load(path)?,
                None => Configuration::default(),
            };
            if let Some(dir) = input_dir {
                configuration.input_directory = dir;
            }
            if let Some(dir) = scenario_dir {
                configuration.scenario_directory = dir;
            }
            if let Some(dir) = output_dir {
                configuration.output_directory = dir;
            }
            if let Some(threshold) = min_base_population {
                configuration.min_base_population = threshold;
            }
            if let Some(schema) = meta_schema {
                configuration.meta_schema = schema;
            }
            if let Some(grouping) = meta_grouping {
                configuration.meta_grouping = grouping;
            }

            // ─── 3) run ──────────────────────────────────────────────
            let summary = run_preprocessor(&configuration, &TracingReporter)?;
            info!(
                zones = summary.zones,
                direct = summary.direct_scaled,
                fallback = summary.puma_fallback,
                meta = summary.meta_records,
                "done"
            );
        }
    }
    Ok(())
}
