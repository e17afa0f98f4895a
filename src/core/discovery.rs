// PlateauLab - core/discovery.rs
//
// Run directory discovery under an experiment directory.
//
// Uses `walkdir` as an OS abstraction; reads only metadata, never log
// contents. Reading and parsing is owned by app::parse_step.
//
// Inaccessible entries are non-fatal and collected as warnings. The run
// count is bounded by a named constant.

use crate::core::model::DiscoveredRun;
use crate::util::constants;
use crate::util::error::DiscoveryError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

// =============================================================================
// Configuration
// =============================================================================

/// Limits for a discovery operation.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum directory recursion depth below the experiment directory.
    pub max_depth: usize,

    /// Discovery fails once more than this many runs are found.
    pub max_runs: usize,

    /// Log size (bytes) at or above which `is_large` is set.
    pub large_log_threshold: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: constants::DEFAULT_MAX_RUN_DEPTH,
            max_runs: constants::DEFAULT_MAX_RUNS,
            large_log_threshold: constants::DEFAULT_LARGE_LOG_THRESHOLD,
        }
    }
}

/// Result of a discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Runs with a log, sorted by directory path.
    pub runs: Vec<DiscoveredRun>,

    /// Run directories laid out by `build` that have no log yet.
    pub pending: Vec<PathBuf>,

    /// Non-fatal problems encountered while walking.
    pub warnings: Vec<String>,
}

// =============================================================================
// Discovery
// =============================================================================

/// Find every run directory under `root`.
///
/// A run directory is one that directly contains `run.log`. The evaluation
/// directory (`<name>-eval`) is never descended into.
pub fn discover_runs<F>(
    root: &Path,
    config: &DiscoveryConfig,
    mut on_run_found: F,
) -> Result<Discovery, DiscoveryError>
where
    F: FnMut(&DiscoveredRun, usize),
{
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(DiscoveryError::NotADirectory {
                path: root.to_path_buf(),
            })
        }
        Err(_) => {
            return Err(DiscoveryError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    }

    let max_runs = config.max_runs.min(constants::ABSOLUTE_MAX_RUNS);
    let max_depth = config.max_depth.min(constants::ABSOLUTE_MAX_RUN_DEPTH);

    tracing::debug!(
        root = %root.display(),
        max_depth,
        max_runs,
        "Run discovery starting"
    );

    let mut discovery = Discovery::default();
    let mut laid_out: BTreeSet<PathBuf> = BTreeSet::new();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.ends_with(constants::EVAL_DIR_SUFFIX))
        });

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                // The root itself must be readable; anything below is non-fatal.
                if e.depth() == 0 {
                    return Err(DiscoveryError::Traversal {
                        path: root.to_path_buf(),
                        source: e,
                    });
                }
                let path_str = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                let msg = format!("Cannot access '{path_str}': {e}");
                tracing::debug!(warning = %msg, "Discovery warning");
                discovery.warnings.push(msg);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };

        let file_name = entry.file_name();
        if file_name == constants::STATIC_PROPERTIES_FILE_NAME {
            laid_out.insert(dir.to_path_buf());
            continue;
        }
        if file_name != constants::RUN_LOG_FILE_NAME {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                let msg = format!("Cannot read metadata for '{}': {e}", entry.path().display());
                tracing::debug!(warning = %msg, "Discovery warning");
                discovery.warnings.push(msg);
                continue;
            }
        };

        if discovery.runs.len() >= max_runs {
            return Err(DiscoveryError::MaxRunsExceeded { max: max_runs });
        }

        let log_size = metadata.len();
        let run = DiscoveredRun {
            dir: dir.to_path_buf(),
            log_path: entry.path().to_path_buf(),
            log_size,
            is_large: log_size >= config.large_log_threshold,
        };

        if run.is_large {
            tracing::debug!(
                log = %run.log_path.display(),
                size_mb = log_size / (1024 * 1024),
                "Large run log flagged"
            );
        }

        on_run_found(&run, discovery.runs.len() + 1);
        discovery.runs.push(run);
    }

    discovery.runs.sort_by(|a, b| a.dir.cmp(&b.dir));

    let with_log: BTreeSet<&Path> = discovery.runs.iter().map(|r| r.dir.as_path()).collect();
    discovery.pending = laid_out
        .into_iter()
        .filter(|d| !with_log.contains(d.as_path()))
        .collect();
    if !discovery.pending.is_empty() {
        tracing::info!(
            count = discovery.pending.len(),
            "Run directories without a log (not executed yet)"
        );
    }

    tracing::debug!(
        runs = discovery.runs.len(),
        pending = discovery.pending.len(),
        warnings = discovery.warnings.len(),
        "Run discovery complete"
    );

    Ok(discovery)
}

// =============================================================================
// Tests
// =============================================================================
