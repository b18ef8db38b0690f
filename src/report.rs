// src/report.rs
use std::sync::Mutex;
use tracing::info;

/// Receives user-facing progress messages from a run.
///
/// Passed explicitly into the generator and pipeline so the caller decides
/// where messages go (a log, a UI, a test buffer).
pub trait Reporter: Sync {
    fn report(&self, message: &str);
}

/// Forwards every message to `tracing` at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, message: &str) {
        info!(target: "popsyn_forecast::report", "{}", message);
    }
}

impl<F> Reporter for F
where
    F: Fn(&str) + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
