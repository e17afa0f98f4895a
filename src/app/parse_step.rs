// PlateauLab - app/parse_step.rs
//
// Parse step: discover run directories, extract metrics from each run.log
// and write the run's `properties` file.
//
// Runs are independent, so they are parsed on a rayon pool. Extraction is
// synchronous and shares no mutable state; results are collected in
// discovery order and reported sorted by run id.

use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::extract;
use crate::core::model::{DiscoveredRun, MetricParser, MetricValue, RunProperties};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{PlateauLabError, StepError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub use crate::util::constants::PARSE_ERROR_PROPERTY;

/// Tunables for one parse step.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub discovery: DiscoveryConfig,

    /// Worker threads (0 = one per core).
    pub worker_threads: usize,
}

/// Result of parsing one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dir: PathBuf,

    /// Run id from the static properties, when present.
    pub id: Option<u64>,

    /// Number of metrics bound (flags included).
    pub metrics: usize,

    /// Why the run failed, if it did.
    pub error: Option<String>,
}

/// Summary of a parse step.
#[derive(Debug, Clone, Default)]
pub struct ParseSummary {
    /// Per-run outcomes, sorted by run id (runs without an id last, by path).
    pub outcomes: Vec<RunOutcome>,

    /// Run directories without a log yet.
    pub pending: usize,

    /// Non-fatal discovery warnings.
    pub warnings: Vec<String>,

    pub duration: Duration,
}

impl ParseSummary {
    pub fn failed(&self) -> impl Iterator<Item = &RunOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }

    /// Turn failed runs into an error so the CLI exits non-zero.
    pub fn check(&self) -> Result<(), StepError> {
        let failed = self.failed().count();
        if failed > 0 {
            return Err(StepError::RunsFailed {
                failed,
                total: self.outcomes.len(),
            });
        }
        Ok(())
    }
}

/// Parse every run under `exp_dir` with `parsers` applied in order.
pub fn parse_experiment(
    exp_dir: &Path,
    parsers: &[&MetricParser],
    options: &ParseOptions,
) -> Result<ParseSummary, PlateauLabError> {
    let start = Instant::now();

    let found = discovery::discover_runs(exp_dir, &options.discovery, |run, count| {
        tracing::trace!(dir = %run.dir.display(), count, "Run discovered");
    })?;
    for warning in &found.warnings {
        tracing::warn!(warning = %warning, "Discovery warning");
    }

    tracing::info!(
        runs = found.runs.len(),
        parsers = parsers.len(),
        threads = options.worker_threads,
        "Parsing run logs"
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.worker_threads)
        .build()
        .map_err(|e| StepError::ThreadPool {
            threads: options.worker_threads,
            source: e,
        })?;

    let mut outcomes: Vec<RunOutcome> =
        pool.install(|| found.runs.par_iter().map(|run| parse_run(run, parsers)).collect());

    outcomes.sort_by(|a, b| match (a.id, b.id) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.dir.cmp(&b.dir)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.dir.cmp(&b.dir),
    });

    let summary = ParseSummary {
        outcomes,
        pending: found.pending.len(),
        warnings: found.warnings,
        duration: start.elapsed(),
    };

    for outcome in summary.failed() {
        tracing::warn!(
            dir = %outcome.dir.display(),
            error = outcome.error.as_deref().unwrap_or_default(),
            "Run failed to parse"
        );
    }
    tracing::info!(
        runs = summary.outcomes.len(),
        failed = summary.failed().count(),
        pending = summary.pending,
        duration_ms = summary.duration.as_millis() as u64,
        "Parse step complete"
    );

    Ok(summary)
}

/// Parse one run and write its properties. Never panics; every failure is
/// recorded in the outcome and, where possible, in the properties file.
fn parse_run(run: &DiscoveredRun, parsers: &[&MetricParser]) -> RunOutcome {
    let mut outcome = RunOutcome {
        dir: run.dir.clone(),
        id: None,
        metrics: 0,
        error: None,
    };

    let mut properties = match read_static_properties(&run.dir) {
        Ok(p) => p,
        Err(e) => {
            // Without static properties the run cannot be placed in a report,
            // so nothing is written and an earlier result must not survive.
            outcome.error = Some(e.to_string());
            if let Err(e) = remove_properties(&run.dir) {
                outcome.error = Some(e.to_string());
            }
            return outcome;
        }
    };
    outcome.id = properties.get("id").and_then(|v| v.as_u64());

    let extracted = fs::read_log(&run.log_path, run.is_large)
        .map_err(|e| format!("cannot read '{}': {e}", run.log_path.display()))
        .and_then(|content| extract::extract_all(&content, parsers).map_err(|e| e.to_string()));

    match extracted {
        Ok(metrics) => {
            outcome.metrics = metrics.len();
            for (name, value) in metrics {
                let json = match value {
                    MetricValue::Int(v) => serde_json::Value::from(v),
                    MetricValue::Float(v) => serde_json::Value::from(v),
                };
                properties.insert(name, json);
            }
        }
        Err(msg) => {
            tracing::debug!(dir = %run.dir.display(), error = %msg, "Parse error");
            properties.insert(
                PARSE_ERROR_PROPERTY.to_string(),
                serde_json::Value::String(msg.clone()),
            );
            outcome.error = Some(msg);
        }
    }

    if let Err(e) = write_properties(&run.dir, &properties) {
        outcome.error = Some(e.to_string());
    }
    outcome
}

/// Read a run's static properties. A run without the file starts empty.
fn read_static_properties(dir: &Path) -> Result<RunProperties, StepError> {
    let path = dir.join(constants::STATIC_PROPERTIES_FILE_NAME);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Run has no static properties");
            return Ok(RunProperties::new());
        }
        Err(e) => return Err(StepError::Io { path, source: e }),
    };
    serde_json::from_str(&content).map_err(|e| StepError::InvalidProperties { path, source: e })
}

/// Remove a stale `properties` file. A missing file is fine.
fn remove_properties(dir: &Path) -> Result<(), StepError> {
    let path = dir.join(constants::PROPERTIES_FILE_NAME);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed stale properties");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StepError::Io { path, source: e }),
    }
}

fn write_properties(dir: &Path, properties: &RunProperties) -> Result<(), StepError> {
    let path = dir.join(constants::PROPERTIES_FILE_NAME);
    let json = serde_json::to_string_pretty(properties).map_err(|e| StepError::Json {
        path: path.clone(),
        source: e,
    })?;
    std::fs::write(&path, json).map_err(|e| StepError::Io { path, source: e })
}
