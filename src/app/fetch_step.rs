// PlateauLab - app/fetch_step.rs
//
// Fetch step: collect every run's `properties` into one dataset file in the
// evaluation directory next to the experiment directory.

use crate::core::discovery::{self, DiscoveryConfig};
use crate::core::model::{run_key, Dataset, RunProperties};
use crate::util::constants;
use crate::util::error::{PlateauLabError, ReportError, StepError};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `<exp-dir>-eval`, a sibling of the experiment directory.
pub fn eval_dir(exp_dir: &Path) -> PathBuf {
    let mut name: OsString = exp_dir.components().as_path().as_os_str().to_os_string();
    name.push(constants::EVAL_DIR_SUFFIX);
    PathBuf::from(name)
}

/// Path of the fetched dataset for an experiment directory.
pub fn dataset_path(exp_dir: &Path) -> PathBuf {
    eval_dir(exp_dir).join(constants::DATASET_FILE_NAME)
}

/// Outcome of a fetch.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    pub dataset_path: PathBuf,
    pub runs: usize,

    /// Runs with a log but no properties (not parsed yet).
    pub unparsed: usize,
}

/// Collect all run properties under `exp_dir` and write the dataset.
pub fn fetch_experiment(
    exp_dir: &Path,
    config: &DiscoveryConfig,
) -> Result<FetchSummary, PlateauLabError> {
    let found = discovery::discover_runs(exp_dir, config, |_, _| {})?;

    let mut dataset = Dataset::new();
    let mut sources: HashMap<String, PathBuf> = HashMap::new();
    let mut unparsed = 0usize;

    for run in &found.runs {
        let path = run.dir.join(constants::PROPERTIES_FILE_NAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %run.dir.display(), "Run has not been parsed, skipping");
                unparsed += 1;
                continue;
            }
            Err(e) => return Err(StepError::Io { path, source: e }.into()),
        };
        let props: RunProperties = serde_json::from_str(&content).map_err(|e| {
            StepError::InvalidProperties {
                path: path.clone(),
                source: e,
            }
        })?;

        let key = key_of(&props, &path)?;
        if let Some(first) = sources.get(&key) {
            return Err(StepError::DuplicateRunKey {
                key,
                first: first.clone(),
                second: run.dir.clone(),
            }
            .into());
        }
        sources.insert(key.clone(), run.dir.clone());
        dataset.insert(key, props);
    }

    let out_dir = eval_dir(exp_dir);
    std::fs::create_dir_all(&out_dir).map_err(|e| StepError::Io {
        path: out_dir.clone(),
        source: e,
    })?;
    let out_path = out_dir.join(constants::DATASET_FILE_NAME);
    let json = serde_json::to_string_pretty(&dataset).map_err(|e| StepError::Json {
        path: out_path.clone(),
        source: e,
    })?;
    std::fs::write(&out_path, json).map_err(|e| StepError::Io {
        path: out_path.clone(),
        source: e,
    })?;

    tracing::info!(
        dataset = %out_path.display(),
        runs = dataset.len(),
        unparsed,
        "Dataset written"
    );

    Ok(FetchSummary {
        dataset_path: out_path,
        runs: dataset.len(),
        unparsed,
    })
}

fn key_of(props: &RunProperties, path: &Path) -> Result<String, ReportError> {
    let field = |name: &'static str| {
        props
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ReportError::MissingRunField {
                key: path.display().to_string(),
                field: name,
            })
    };
    Ok(run_key(field("algorithm")?, field("domain")?, field("problem")?))
}

/// Load a fetched dataset.
pub fn load_dataset(path: &Path) -> Result<Dataset, PlateauLabError> {
    let content = std::fs::read_to_string(path).map_err(|e| PlateauLabError::Io {
        path: path.to_path_buf(),
        operation: "read dataset",
        source: e,
    })?;
    let dataset: Dataset =
        serde_json::from_str(&content).map_err(|e| ReportError::InvalidDataset {
            path: path.to_path_buf(),
            source: e,
        })?;
    tracing::debug!(path = %path.display(), runs = dataset.len(), "Dataset loaded");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_run(root: &Path, id: u32, props: Option<&str>) {
        let dir = root.join("runs-00001-00100").join(format!("{id:05}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("run.log"), "").unwrap();
        if let Some(p) = props {
            std::fs::write(dir.join("properties"), p).unwrap();
        }
    }

    #[test]
    fn test_eval_dir_is_sibling() {
        assert_eq!(eval_dir(Path::new("/x/exp")), PathBuf::from("/x/exp-eval"));
        assert_eq!(eval_dir(Path::new("/x/exp/")), PathBuf::from("/x/exp-eval"));
    }

    #[test]
    fn test_fetch_collects_runs_by_key() {
        let out = tempfile::tempdir().unwrap();
        let exp = out.path().join("exp");
        write_run(
            &exp,
            1,
            Some(r#"{"algorithm": "fifo", "domain": "gripper", "problem": "p1.pddl", "coverage": 1}"#),
        );
        write_run(
            &exp,
            2,
            Some(r#"{"algorithm": "lifo", "domain": "gripper", "problem": "p1.pddl", "coverage": 0}"#),
        );
        write_run(&exp, 3, None);

        let summary = fetch_experiment(&exp, &DiscoveryConfig::default()).unwrap();
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.unparsed, 1);
        assert_eq!(summary.dataset_path, out.path().join("exp-eval").join("properties.json"));

        let dataset = load_dataset(&summary.dataset_path).unwrap();
        assert_eq!(dataset["fifo-gripper-p1.pddl"]["coverage"], 1);
        assert_eq!(dataset["lifo-gripper-p1.pddl"]["coverage"], 0);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let out = tempfile::tempdir().unwrap();
        let exp = out.path().join("exp");
        let props = r#"{"algorithm": "fifo", "domain": "gripper", "problem": "p1.pddl"}"#;
        write_run(&exp, 1, Some(props));
        write_run(&exp, 2, Some(props));

        let err = fetch_experiment(&exp, &DiscoveryConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            PlateauLabError::Step(StepError::DuplicateRunKey { .. })
        ));
    }

    #[test]
    fn test_load_invalid_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            load_dataset(&path),
            Err(PlateauLabError::Report(ReportError::InvalidDataset { .. }))
        ));
    }
}
