// PlateauLab - app/build_step.rs
//
// Lays an experiment out on disk for the external runner: one directory per
// run with its static properties and planner command, plus plan.json.

use crate::core::experiment::{self, Experiment, TaskLister};
use crate::core::model::{Environment, Run};
use crate::platform::env::{self, EnvSource};
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{ExperimentError, PlateauLabError, StepError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Lists benchmark files on the real filesystem.
#[derive(Debug, Clone)]
pub struct FsTaskLister {
    root: PathBuf,
}

impl FsTaskLister {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl TaskLister for FsTaskLister {
    fn list_files(&self, domain: &str) -> Result<Option<Vec<String>>, ExperimentError> {
        let dir = self.root.join(domain);
        let io_err = |e| ExperimentError::Io {
            path: dir.clone(),
            source: e,
        };
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(
                    dir = %dir.display(),
                    name = ?raw,
                    "Skipping benchmark file with non-UTF-8 name"
                ),
            }
        }
        Ok(Some(names))
    }
}

/// Read and validate an experiment definition file.
pub fn load_experiment_file(
    path: &Path,
    known_parsers: &[&str],
) -> Result<Experiment, ExperimentError> {
    let content = match fs::read_bounded(path, constants::MAX_EXPERIMENT_FILE_SIZE) {
        Ok(Ok(c)) => c,
        Ok(Err(size)) => {
            return Err(ExperimentError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                max_size: constants::MAX_EXPERIMENT_FILE_SIZE,
            })
        }
        Err(e) => {
            return Err(ExperimentError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    experiment::load_experiment(&content, path, known_parsers)
}

/// Contents of a run's `static-properties` file.
#[derive(Debug, Serialize)]
struct StaticProperties<'a> {
    id: usize,
    algorithm: &'a str,
    config_nick: &'a str,
    revision: &'a str,
    domain: &'a str,
    problem: &'a str,
    domain_file: &'a Path,
    problem_file: &'a Path,
    experiment_name: &'a str,
}

#[derive(Debug, Serialize)]
struct Plan<'a> {
    experiment: &'a str,
    created: DateTime<Utc>,
    tool_version: &'static str,
    environment: &'a Environment,
    parsers: &'a [String],
    algorithms: Vec<String>,
    runs: Vec<PlanEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct PlanEntry<'a> {
    id: usize,
    dir: String,
    algorithm: &'a str,
    domain: &'a str,
    problem: &'a str,
}

/// Outcome of a build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub exp_dir: PathBuf,
    pub runs: usize,
    pub blocks: usize,
}

/// Resolve the benchmark and repository directories from the environment,
/// then build. Fails before writing anything when a variable is missing.
pub fn build_from_env<E: EnvSource + ?Sized>(
    experiment: &Experiment,
    exp_dir: &Path,
    env: &E,
    overwrite: bool,
) -> Result<BuildSummary, PlateauLabError> {
    let benchmarks_dir = env::require_dir(env, &experiment.benchmarks_env)?;
    let repo_dir = env::require_dir(env, &experiment.repo_env)?;
    let lister = FsTaskLister::new(&benchmarks_dir);
    build_experiment(experiment, exp_dir, &benchmarks_dir, &repo_dir, &lister, overwrite)
}

/// Plan every run and write the experiment directory.
pub fn build_experiment<L: TaskLister + ?Sized>(
    experiment: &Experiment,
    exp_dir: &Path,
    benchmarks_dir: &Path,
    repo_dir: &Path,
    lister: &L,
    overwrite: bool,
) -> Result<BuildSummary, PlateauLabError> {
    let runs = experiment::plan_runs(experiment, benchmarks_dir, repo_dir, lister)?;

    prepare_dir(exp_dir, overwrite)?;

    let mut entries = Vec::with_capacity(runs.len());
    let mut blocks = 0usize;
    for run in &runs {
        let rel_dir = Path::new(&block_dir_name(run.id)).join(run.dir_name());
        let run_dir = exp_dir.join(&rel_dir);
        if (run.id - 1) % constants::RUNS_PER_BLOCK == 0 {
            blocks += 1;
        }
        write_run(experiment, run, &run_dir)?;
        entries.push(PlanEntry {
            id: run.id,
            dir: rel_dir.display().to_string(),
            algorithm: &run.algorithm,
            domain: &run.domain,
            problem: &run.problem,
        });
    }

    let plan = Plan {
        experiment: &experiment.name,
        created: Utc::now(),
        tool_version: constants::APP_VERSION,
        environment: &experiment.environment,
        parsers: &experiment.parsers,
        algorithms: experiment.algorithms(),
        runs: entries,
    };
    write_json(&exp_dir.join(constants::PLAN_FILE_NAME), &plan)?;

    tracing::info!(
        experiment = %experiment.name,
        dir = %exp_dir.display(),
        runs = runs.len(),
        blocks,
        "Experiment directory written"
    );

    Ok(BuildSummary {
        exp_dir: exp_dir.to_path_buf(),
        runs: runs.len(),
        blocks,
    })
}

fn prepare_dir(exp_dir: &Path, overwrite: bool) -> Result<(), StepError> {
    let io_err = |e| StepError::Io {
        path: exp_dir.to_path_buf(),
        source: e,
    };
    if !fs::is_missing_or_empty_dir(exp_dir).map_err(io_err)? {
        if !overwrite {
            return Err(StepError::DirectoryNotEmpty {
                path: exp_dir.to_path_buf(),
            });
        }
        tracing::warn!(dir = %exp_dir.display(), "Removing existing experiment directory");
        std::fs::remove_dir_all(exp_dir).map_err(io_err)?;
    }
    std::fs::create_dir_all(exp_dir).map_err(io_err)
}

fn write_run(experiment: &Experiment, run: &Run, run_dir: &Path) -> Result<(), StepError> {
    std::fs::create_dir_all(run_dir).map_err(|e| StepError::Io {
        path: run_dir.to_path_buf(),
        source: e,
    })?;

    let props = StaticProperties {
        id: run.id,
        algorithm: &run.algorithm,
        config_nick: &run.config_nick,
        revision: &run.revision,
        domain: &run.domain,
        problem: &run.problem,
        domain_file: &run.domain_file,
        problem_file: &run.problem_file,
        experiment_name: &experiment.name,
    };
    write_json(&run_dir.join(constants::STATIC_PROPERTIES_FILE_NAME), &props)?;

    let command_path = run_dir.join(constants::COMMAND_FILE_NAME);
    let command = run
        .argv
        .iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ");
    std::fs::write(&command_path, format!("{command}\n")).map_err(|e| StepError::Io {
        path: command_path,
        source: e,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StepError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| StepError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(|e| StepError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// `runs-00001-00100` for ids 1 to 100, and so on.
pub fn block_dir_name(run_id: usize) -> String {
    let first = (run_id - 1) / constants::RUNS_PER_BLOCK * constants::RUNS_PER_BLOCK + 1;
    let last = first + constants::RUNS_PER_BLOCK - 1;
    format!("runs-{first:05}-{last:05}")
}

/// Quote an argument for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_-+=.,:/@%".contains(c);
    if !arg.is_empty() && arg.chars().all(safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}
