// src/lib.rs
pub mod check;
pub mod config;
pub mod controls;
pub mod csv_utils;
pub mod error;
pub mod forecast;
pub mod meta;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod zones;

pub use config::Configuration;
pub use error::{ControlError, ControlResult};
pub use pipeline::{run_preprocessor, RunSummary};

/// Route `tracing` output to the test harness.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,popsyn_forecast=debug")),
        )
        .with_test_writer()
        .finish();
    // already set by another test
    let _ = tracing::subscriber::set_global_default(subscriber);
}
