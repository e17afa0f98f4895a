// PlateauLab - core/experiment.rs
//
// Experiment definitions: TOML loading, validation, configuration-family
// expansion, and run planning.
// Core layer: benchmark directories are reached only through `TaskLister`,
// implemented over the real filesystem by app::build_step::FsTaskLister.

use crate::core::model::{
    default_attributes, Attribute, Configuration, Environment, Run, SuiteEntry, TieBreaking,
};
use crate::util::constants;
use crate::util::error::ExperimentError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw TOML experiment definition.
#[derive(Debug, Deserialize)]
pub struct ExperimentDefinition {
    pub experiment: ExperimentMeta,
    pub suite: SuiteDef,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default, rename = "config")]
    pub configs: Vec<ConfigDef>,
    #[serde(default, rename = "family")]
    pub families: Vec<FamilyDef>,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
pub struct ExperimentMeta {
    pub name: String,
    #[serde(default)]
    pub revisions: Vec<String>,
    #[serde(default)]
    pub driver_options: Vec<String>,
    #[serde(default = "default_parsers")]
    pub parsers: Vec<String>,
    #[serde(default = "default_benchmarks_env")]
    pub benchmarks_env: String,
    #[serde(default = "default_repo_env")]
    pub repo_env: String,
    /// Planner driver script, relative to the repository directory.
    /// `{revision}` is replaced by each revision; it is required when more
    /// than one revision is listed.
    #[serde(default = "default_driver")]
    pub driver: String,
}

fn default_parsers() -> Vec<String> {
    vec![
        "search".to_string(),
        "planner".to_string(),
        "plateau".to_string(),
    ]
}

fn default_benchmarks_env() -> String {
    "DOWNWARD_BENCHMARKS".to_string()
}

fn default_repo_env() -> String {
    "DOWNWARD_REPO".to_string()
}

fn default_driver() -> String {
    "fast-downward.py".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SuiteDef {
    pub tasks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigDef {
    pub nick: String,
    pub options: Vec<String>,
    /// Overrides the experiment-wide driver options when present.
    #[serde(default)]
    pub driver_options: Option<Vec<String>>,
}

/// A configuration template expanded once per tie-breaking criterion, with
/// random tie-breaking repeated `random_replicas` times.
#[derive(Debug, Deserialize)]
pub struct FamilyDef {
    pub nick: String,
    pub options: Vec<String>,
    pub tiebreaking: Vec<TieBreaking>,
    #[serde(default = "default_replicas")]
    pub random_replicas: u32,
    #[serde(default)]
    pub driver_options: Option<Vec<String>>,
}

fn default_replicas() -> u32 {
    1
}

// =============================================================================
// Validated experiment
// =============================================================================

/// A validated experiment with all families expanded.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub name: String,
    pub revisions: Vec<String>,
    pub configs: Vec<Configuration>,
    pub suite: Vec<SuiteEntry>,
    pub environment: Environment,
    pub parsers: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub benchmarks_env: String,
    pub repo_env: String,
    pub driver: String,
}

impl Experiment {
    /// Column key for a configuration under a revision.
    pub fn algorithm_name(&self, revision: &str, nick: &str) -> String {
        if self.revisions.len() == 1 {
            nick.to_string()
        } else {
            let prefix: String = revision.chars().take(constants::REVISION_PREFIX_LEN).collect();
            format!("{prefix}-{nick}")
        }
    }

    /// All algorithm names in planning order.
    pub fn algorithms(&self) -> Vec<String> {
        self.configs
            .iter()
            .flat_map(|c| {
                self.revisions
                    .iter()
                    .map(move |r| self.algorithm_name(r, &c.nick))
            })
            .collect()
    }
}

/// Parse a TOML string into an `ExperimentDefinition`.
pub fn parse_experiment_toml(
    toml_content: &str,
    source_path: &Path,
) -> Result<ExperimentDefinition, ExperimentError> {
    toml::from_str(toml_content).map_err(|e| ExperimentError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Parse, validate, and expand an experiment definition.
///
/// `known_parsers` lists the ids of all loaded parsers; selecting any other
/// parser is a misconfiguration.
pub fn load_experiment(
    toml_content: &str,
    source_path: &Path,
    known_parsers: &[&str],
) -> Result<Experiment, ExperimentError> {
    let def = parse_experiment_toml(toml_content, source_path)?;
    validate_and_expand(def, known_parsers)
}

/// Validate a raw definition and expand its configuration families.
pub fn validate_and_expand(
    def: ExperimentDefinition,
    known_parsers: &[&str],
) -> Result<Experiment, ExperimentError> {
    let meta = def.experiment;

    if meta.name.trim().is_empty() {
        return Err(ExperimentError::MissingField {
            field: "experiment.name",
        });
    }
    if meta.revisions.is_empty() || meta.revisions.iter().any(|r| r.trim().is_empty()) {
        return Err(ExperimentError::MissingField {
            field: "experiment.revisions",
        });
    }
    if meta.driver.trim().is_empty() {
        return Err(ExperimentError::MissingField {
            field: "experiment.driver",
        });
    }
    validate_revisions(&meta.revisions, &meta.driver)?;
    for var in [&meta.benchmarks_env, &meta.repo_env] {
        if !is_env_var_name(var) {
            return Err(ExperimentError::InvalidEnvironment {
                reason: format!("'{var}' is not a valid environment variable name"),
            });
        }
    }

    for id in &meta.parsers {
        if !known_parsers.contains(&id.as_str()) {
            return Err(ExperimentError::UnknownParser { id: id.clone() });
        }
    }

    validate_environment(&def.environment)?;

    let suite = def
        .suite
        .tasks
        .iter()
        .map(|entry| parse_suite_entry(entry))
        .collect::<Result<Vec<_>, _>>()?;
    if suite.is_empty() {
        return Err(ExperimentError::MissingField {
            field: "suite.tasks",
        });
    }

    let mut configs: Vec<Configuration> = def
        .configs
        .into_iter()
        .map(|c| Configuration {
            nick: c.nick,
            component_options: c.options,
            driver_options: c
                .driver_options
                .unwrap_or_else(|| meta.driver_options.clone()),
        })
        .collect();
    for family in &def.families {
        configs.extend(expand_family(family, &meta.driver_options)?);
    }

    if configs.is_empty() {
        return Err(ExperimentError::NoConfigurations);
    }
    let mut nicks = HashSet::new();
    for c in &configs {
        if c.nick.trim().is_empty() {
            return Err(ExperimentError::MissingField {
                field: "config.nick",
            });
        }
        if !nicks.insert(c.nick.as_str()) {
            return Err(ExperimentError::DuplicateNick {
                nick: c.nick.clone(),
            });
        }
    }

    let attributes = if def.attributes.is_empty() {
        default_attributes()
    } else {
        let mut names = HashSet::new();
        for a in &def.attributes {
            if !names.insert(a.name.as_str()) {
                return Err(ExperimentError::DuplicateAttribute {
                    name: a.name.clone(),
                });
            }
        }
        def.attributes
    };

    tracing::debug!(
        experiment = %meta.name,
        configs = configs.len(),
        revisions = meta.revisions.len(),
        suite_entries = suite.len(),
        "Experiment definition validated"
    );

    Ok(Experiment {
        name: meta.name,
        revisions: meta.revisions,
        configs,
        suite,
        environment: def.environment,
        parsers: meta.parsers,
        attributes,
        benchmarks_env: meta.benchmarks_env,
        repo_env: meta.repo_env,
        driver: meta.driver,
    })
}

/// Each revision needs its own algorithm prefix and its own planner build.
fn validate_revisions(revisions: &[String], driver: &str) -> Result<(), ExperimentError> {
    let mut seen = HashSet::new();
    for revision in revisions {
        let prefix: String = revision.chars().take(constants::REVISION_PREFIX_LEN).collect();
        if !seen.insert(prefix) {
            return Err(ExperimentError::InvalidRevision {
                revision: revision.clone(),
                reason: format!(
                    "shares its first {} characters with another revision",
                    constants::REVISION_PREFIX_LEN
                ),
            });
        }
    }
    if revisions.len() > 1 && !driver.contains(REVISION_PLACEHOLDER) {
        return Err(ExperimentError::InvalidRevision {
            revision: revisions[1].clone(),
            reason: format!(
                "needs a driver path containing {REVISION_PLACEHOLDER} when several \
                 revisions are compared"
            ),
        });
    }
    Ok(())
}

fn validate_environment(env: &Environment) -> Result<(), ExperimentError> {
    match env {
        Environment::Local { processes } => {
            if *processes == 0 {
                return Err(ExperimentError::InvalidEnvironment {
                    reason: "local environment needs at least one process".to_string(),
                });
            }
        }
        Environment::Slurm {
            partition,
            email,
            export,
        } => {
            if partition.trim().is_empty() {
                return Err(ExperimentError::InvalidEnvironment {
                    reason: "slurm partition is empty".to_string(),
                });
            }
            if let Some(addr) = email {
                if !addr.contains('@') {
                    return Err(ExperimentError::InvalidEnvironment {
                        reason: format!("'{addr}' is not an email address"),
                    });
                }
            }
            if let Some(bad) = export.iter().find(|v| !is_env_var_name(v)) {
                return Err(ExperimentError::InvalidEnvironment {
                    reason: format!("cannot export '{bad}': not a variable name"),
                });
            }
        }
    }
    Ok(())
}

fn is_env_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Parse `domain` or `domain:problem.pddl`.
pub fn parse_suite_entry(entry: &str) -> Result<SuiteEntry, ExperimentError> {
    let invalid = || ExperimentError::InvalidSuiteEntry {
        entry: entry.to_string(),
    };
    let (domain, problem) = match entry.split_once(':') {
        Some((d, p)) => (d.trim(), Some(p.trim())),
        None => (entry.trim(), None),
    };
    if domain.is_empty() || domain.contains(['/', '\\']) {
        return Err(invalid());
    }
    match problem {
        Some(p) if p.is_empty() || p.contains([':', '/', '\\']) => Err(invalid()),
        _ => Ok(SuiteEntry {
            domain: domain.to_string(),
            problem: problem.map(str::to_string),
        }),
    }
}

// =============================================================================
// Configuration families
// =============================================================================

/// Expand a family into one configuration per criterion and replica.
///
/// Placeholders substituted in the nick and every option:
/// `{tiebreak}` criterion keyword, `{label}` short label (`fifo`, `lifo`,
/// `ro`, or `ro<d>` when replicated), `{suffix}` empty for the first replica
/// and `<d>` otherwise, `{seed}` the 1-based replica number. `<d>` is the
/// replica number's last digit, so the tenth replica is `ro0` with suffix `0`.
pub fn expand_family(
    family: &FamilyDef,
    default_driver_options: &[String],
) -> Result<Vec<Configuration>, ExperimentError> {
    let invalid = |reason: String| ExperimentError::InvalidFamily {
        family: family.nick.clone(),
        reason,
    };

    if family.tiebreaking.is_empty() {
        return Err(invalid("no tie-breaking criteria listed".to_string()));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = family.tiebreaking.iter().find(|t| !seen.insert(**t)) {
        return Err(invalid(format!("criterion '{}' listed twice", dup.keyword())));
    }
    if family.random_replicas == 0 || family.random_replicas > constants::MAX_RANDOM_REPLICAS {
        return Err(invalid(format!(
            "random_replicas = {} is out of range (1-{})",
            family.random_replicas,
            constants::MAX_RANDOM_REPLICAS
        )));
    }
    if !family.nick.contains("{label}") && !family.nick.contains("{tiebreak}") {
        return Err(invalid(
            "nick must contain {label} or {tiebreak} to tell the expansions apart".to_string(),
        ));
    }
    if family.random_replicas > 1 && !family.tiebreaking.contains(&TieBreaking::Random) {
        tracing::warn!(
            family = %family.nick,
            "random_replicas has no effect without random tie-breaking"
        );
    }

    let driver_options = family
        .driver_options
        .clone()
        .unwrap_or_else(|| default_driver_options.to_vec());

    let mut configs = Vec::new();
    for criterion in &family.tiebreaking {
        let replicas = if criterion.is_stochastic() {
            family.random_replicas
        } else {
            1
        };
        for k in 1..=replicas {
            let label = match criterion {
                TieBreaking::Fifo => "fifo".to_string(),
                TieBreaking::Lifo => "lifo".to_string(),
                TieBreaking::Random if replicas == 1 => "ro".to_string(),
                TieBreaking::Random => format!("ro{}", k % 10),
            };
            let suffix = if k == 1 {
                String::new()
            } else {
                (k % 10).to_string()
            };
            let fill = |template: &str| {
                template
                    .replace("{tiebreak}", criterion.keyword())
                    .replace("{label}", &label)
                    .replace("{suffix}", &suffix)
                    .replace("{seed}", &k.to_string())
            };
            configs.push(Configuration {
                nick: fill(&family.nick),
                component_options: family.options.iter().map(|o| fill(o)).collect(),
                driver_options: driver_options.clone(),
            });
        }
    }

    Ok(configs)
}

// =============================================================================
// Run planning
// =============================================================================

/// Replaced by the revision in the driver path.
pub const REVISION_PLACEHOLDER: &str = "{revision}";

/// Read access to a benchmarks directory.
pub trait TaskLister {
    /// File names directly inside the domain directory, or `None` when the
    /// domain directory does not exist.
    fn list_files(&self, domain: &str) -> Result<Option<Vec<String>>, ExperimentError>;
}

/// A resolved benchmark instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub domain: String,
    pub problem: String,
    pub domain_file: String,
}

/// Resolve every suite entry to concrete tasks, problems sorted by name.
pub fn resolve_suite<L: TaskLister + ?Sized>(
    suite: &[SuiteEntry],
    benchmarks_dir: &Path,
    lister: &L,
) -> Result<Vec<Task>, ExperimentError> {
    let domain_glob = file_pattern(constants::DOMAIN_FILE_GLOB)?;
    let problem_glob = file_pattern(constants::PROBLEM_FILE_GLOB)?;

    let mut tasks = Vec::new();
    for entry in suite {
        let files = lister
            .list_files(&entry.domain)?
            .ok_or_else(|| ExperimentError::DomainNotFound {
                domain: entry.domain.clone(),
                path: benchmarks_dir.join(&entry.domain),
            })?;

        let mut problems: Vec<&String> = match &entry.problem {
            Some(p) => {
                let found = files.iter().find(|f| *f == p).ok_or_else(|| {
                    ExperimentError::ProblemNotFound {
                        domain: entry.domain.clone(),
                        problem: p.clone(),
                    }
                })?;
                vec![found]
            }
            None => files
                .iter()
                .filter(|f| problem_glob.matches(f) && !domain_glob.matches(f))
                .collect(),
        };
        problems.sort();

        if problems.is_empty() {
            tracing::warn!(domain = %entry.domain, "Suite domain contains no problems");
        }

        for problem in problems {
            let domain_file = find_domain_file(problem, &files).ok_or_else(|| {
                ExperimentError::NoDomainFile {
                    domain: entry.domain.clone(),
                    problem: problem.clone(),
                }
            })?;
            tasks.push(Task {
                domain: entry.domain.clone(),
                problem: problem.clone(),
                domain_file,
            });
        }
    }
    Ok(tasks)
}

fn file_pattern(pattern: &str) -> Result<glob::Pattern, ExperimentError> {
    glob::Pattern::new(pattern).map_err(|e| ExperimentError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}

/// Domain file for a problem: `domain.pddl`, then `<stem>-domain.pddl`, then
/// `domain_<problem>`.
fn find_domain_file(problem: &str, files: &[String]) -> Option<String> {
    let stem = problem.strip_suffix(".pddl").unwrap_or(problem);
    [
        "domain.pddl".to_string(),
        format!("{stem}-domain.pddl"),
        format!("domain_{problem}"),
    ]
    .into_iter()
    .find(|candidate| files.iter().any(|f| f == candidate))
}

/// Plan all runs: configurations × revisions × tasks, algorithm-major.
pub fn plan_runs<L: TaskLister + ?Sized>(
    experiment: &Experiment,
    benchmarks_dir: &Path,
    repo_dir: &Path,
    lister: &L,
) -> Result<Vec<Run>, ExperimentError> {
    let tasks = resolve_suite(&experiment.suite, benchmarks_dir, lister)?;

    let mut keys = HashSet::new();
    let mut runs = Vec::with_capacity(tasks.len() * experiment.configs.len());
    for config in &experiment.configs {
        for revision in &experiment.revisions {
            let algorithm = experiment.algorithm_name(revision, &config.nick);
            let driver = repo_dir.join(experiment.driver.replace(REVISION_PLACEHOLDER, revision));
            for task in &tasks {
                let domain_file = benchmarks_dir.join(&task.domain).join(&task.domain_file);
                let problem_file = benchmarks_dir.join(&task.domain).join(&task.problem);

                let mut argv = Vec::with_capacity(
                    3 + config.driver_options.len() + config.component_options.len(),
                );
                argv.push(driver.display().to_string());
                argv.extend(config.driver_options.iter().cloned());
                argv.push(domain_file.display().to_string());
                argv.push(problem_file.display().to_string());
                argv.extend(config.component_options.iter().cloned());

                let run = Run {
                    id: runs.len() + 1,
                    algorithm: algorithm.clone(),
                    config_nick: config.nick.clone(),
                    revision: revision.clone(),
                    domain: task.domain.clone(),
                    problem: task.problem.clone(),
                    domain_file,
                    problem_file,
                    argv,
                };
                // The fetch step keys the dataset by run key.
                if !keys.insert(run.key()) {
                    return Err(ExperimentError::DuplicateRunKey { key: run.key() });
                }
                runs.push(run);
            }
        }
    }

    tracing::info!(
        experiment = %experiment.name,
        tasks = tasks.len(),
        algorithms = experiment.configs.len() * experiment.revisions.len(),
        runs = runs.len(),
        "Runs planned"
    );

    Ok(runs)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Aggregation;
    use std::collections::HashMap;
    use std::path::PathBuf;

    const KNOWN: &[&str] = &["search", "planner", "plateau", "landmark"];

    const EXPERIMENT_TOML: &str = r#"
[experiment]
name = "distance-test"
revisions = ["1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5"]
driver_options = ["--overall-time-limit", "5m"]
parsers = ["search", "plateau"]

[suite]
tasks = ["gripper", "depot:p01.pddl"]

[environment]
kind = "slurm"
partition = "infai_2"
email = "someone@example.org"
export = ["PATH", "DOWNWARD_BENCHMARKS"]

[[config]]
nick = "[f, h^, fifo]"
options = ["--search", "eager(criteria_tiebreaking([sum([g(), h]), h], tiebreaking_criteria=fifo))"]

[[family]]
nick = "f, h^-ff, <d>, {label}"
options = ["--search", "let(h{suffix}, lmcut(), eager(div_tiebreaking([h{suffix}], tiebreaking_criteria={tiebreak})))"]
tiebreaking = ["fifo", "lifo", "random"]
random_replicas = 3

[[attribute]]
name = "max_depth"
min_wins = false
function = "arithmetic_mean"
"#;

    struct MapLister(HashMap<String, Vec<String>>);

    impl TaskLister for MapLister {
        fn list_files(&self, domain: &str) -> Result<Option<Vec<String>>, ExperimentError> {
            Ok(self.0.get(domain).cloned())
        }
    }

    fn lister() -> MapLister {
        let mut map = HashMap::new();
        map.insert(
            "gripper".to_string(),
            vec![
                "prob02.pddl".to_string(),
                "domain.pddl".to_string(),
                "prob01.pddl".to_string(),
                "README".to_string(),
            ],
        );
        map.insert(
            "depot".to_string(),
            vec![
                "p01.pddl".to_string(),
                "p01-domain.pddl".to_string(),
                "p02.pddl".to_string(),
                "p02-domain.pddl".to_string(),
            ],
        );
        MapLister(map)
    }

    fn experiment() -> Experiment {
        load_experiment(EXPERIMENT_TOML, Path::new("exp.toml"), KNOWN).unwrap()
    }

    #[test]
    fn test_load_expands_families_after_explicit_configs() {
        let exp = experiment();
        let nicks: Vec<&str> = exp.configs.iter().map(|c| c.nick.as_str()).collect();
        assert_eq!(
            nicks,
            vec![
                "[f, h^, fifo]",
                "f, h^-ff, <d>, fifo",
                "f, h^-ff, <d>, lifo",
                "f, h^-ff, <d>, ro1",
                "f, h^-ff, <d>, ro2",
                "f, h^-ff, <d>, ro3",
            ]
        );
        assert_eq!(exp.attributes.len(), 1);
        assert_eq!(exp.attributes[0].function, Aggregation::ArithmeticMean);
        assert_eq!(exp.benchmarks_env, "DOWNWARD_BENCHMARKS");
    }

    #[test]
    fn test_family_placeholders_substituted() {
        let exp = experiment();
        let ro2 = exp.configs.iter().find(|c| c.nick.ends_with("ro2")).unwrap();
        assert_eq!(
            ro2.component_options[1],
            "let(h2, lmcut(), eager(div_tiebreaking([h2], tiebreaking_criteria=random)))"
        );
        let ro1 = exp.configs.iter().find(|c| c.nick.ends_with("ro1")).unwrap();
        assert!(ro1.component_options[1].starts_with("let(h, lmcut()"));
        assert_eq!(ro1.driver_options, vec!["--overall-time-limit", "5m"]);
    }

    #[test]
    fn test_single_random_replica_is_labelled_ro() {
        let family = FamilyDef {
            nick: "[f, h^, {label}]".to_string(),
            options: vec!["tiebreaking_criteria={tiebreak}".to_string()],
            tiebreaking: vec![TieBreaking::Random],
            random_replicas: 1,
            driver_options: None,
        };
        let configs = expand_family(&family, &[]).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].nick, "[f, h^, ro]");
        assert_eq!(configs[0].component_options[0], "tiebreaking_criteria=random");
    }

    #[test]
    fn test_tenth_replica_wraps_to_zero() {
        let family = FamilyDef {
            nick: "f, h^, {label}".to_string(),
            options: vec!["let(h{suffix}, lmcut(), astar(h{suffix}, seed={seed}))".to_string()],
            tiebreaking: vec![TieBreaking::Random],
            random_replicas: 10,
            driver_options: None,
        };
        let configs = expand_family(&family, &[]).unwrap();
        assert_eq!(configs.len(), 10);
        assert_eq!(configs[0].nick, "f, h^, ro1");
        assert_eq!(configs[8].nick, "f, h^, ro9");
        assert_eq!(configs[9].nick, "f, h^, ro0");
        assert_eq!(
            configs[9].component_options[0],
            "let(h0, lmcut(), astar(h0, seed=10))"
        );
        let nicks: HashSet<&str> = configs.iter().map(|c| c.nick.as_str()).collect();
        assert_eq!(nicks.len(), 10);
    }

    #[test]
    fn test_family_without_label_placeholder_rejected() {
        let family = FamilyDef {
            nick: "same name".to_string(),
            options: Vec::new(),
            tiebreaking: vec![TieBreaking::Fifo, TieBreaking::Lifo],
            random_replicas: 1,
            driver_options: None,
        };
        assert!(matches!(
            expand_family(&family, &[]),
            Err(ExperimentError::InvalidFamily { .. })
        ));
    }

    #[test]
    fn test_family_replica_bounds() {
        let family = FamilyDef {
            nick: "{label}".to_string(),
            options: Vec::new(),
            tiebreaking: vec![TieBreaking::Random],
            random_replicas: constants::MAX_RANDOM_REPLICAS + 1,
            driver_options: None,
        };
        assert!(matches!(
            expand_family(&family, &[]),
            Err(ExperimentError::InvalidFamily { .. })
        ));
    }

    #[test]
    fn test_duplicate_nick_rejected() {
        let toml = r#"
[experiment]
name = "dup"
revisions = ["abc"]

[suite]
tasks = ["gripper"]

[[config]]
nick = "fifo"
options = []

[[family]]
nick = "{label}"
options = []
tiebreaking = ["fifo"]
"#;
        match load_experiment(toml, Path::new("dup.toml"), KNOWN).unwrap_err() {
            ExperimentError::DuplicateNick { nick } => assert_eq!(nick, "fifo"),
            other => panic!("Expected DuplicateNick, got: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_parser_rejected() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["abc"]
parsers = ["nonexistent"]

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::UnknownParser { .. })
        ));
    }

    #[test]
    fn test_missing_revisions_rejected() {
        let toml = r#"
[experiment]
name = "x"

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::MissingField {
                field: "experiment.revisions"
            })
        ));
    }

    #[test]
    fn test_blank_revision_rejected() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["abc", " "]
driver = "builds/{revision}/fast-downward.py"

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::MissingField {
                field: "experiment.revisions"
            })
        ));
    }

    #[test]
    fn test_several_revisions_need_revision_driver() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5", "1250970671146f94691f5f3d2793462e0ea463d3"]

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::InvalidRevision { .. })
        ));
    }

    #[test]
    fn test_revisions_with_same_prefix_rejected() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["1a415eebfdd9640db81d", "1a415eebfdd9640db81d4458"]
driver = "builds/{revision}/fast-downward.py"

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::InvalidRevision { .. })
        ));
    }

    #[test]
    fn test_plan_runs_uses_each_revisions_build() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5", "1250970671146f94691f5f3d2793462e0ea463d3"]
driver = "builds/{revision}/fast-downward.py"

[suite]
tasks = ["depot:p01.pddl"]

[[config]]
nick = "a"
options = ["--search", "astar(lmcut())"]
"#;
        let exp = load_experiment(toml, Path::new("x.toml"), KNOWN).unwrap();
        let runs = plan_runs(&exp, Path::new("/bench"), Path::new("/repo"), &lister()).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].algorithm, "1a415eebfd-a");
        assert_eq!(runs[1].algorithm, "1250970671-a");
        assert_eq!(
            runs[0].argv[0],
            "/repo/builds/1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5/fast-downward.py"
        );
        assert_eq!(
            runs[1].argv[0],
            "/repo/builds/1250970671146f94691f5f3d2793462e0ea463d3/fast-downward.py"
        );
        assert_eq!(runs[0].argv[1..], runs[1].argv[1..]);
    }

    #[test]
    fn test_no_configurations_rejected() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["abc"]

[suite]
tasks = ["gripper"]
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::NoConfigurations)
        ));
    }

    #[test]
    fn test_invalid_slurm_environment_rejected() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["abc"]

[suite]
tasks = ["gripper"]

[environment]
kind = "slurm"
partition = "infai_2"
export = ["PATH", "NOT-A-VAR"]

[[config]]
nick = "a"
options = []
"#;
        assert!(matches!(
            load_experiment(toml, Path::new("x.toml"), KNOWN),
            Err(ExperimentError::InvalidEnvironment { .. })
        ));
    }

    #[test]
    fn test_default_attributes_when_none_declared() {
        let toml = r#"
[experiment]
name = "x"
revisions = ["abc"]

[suite]
tasks = ["gripper"]

[[config]]
nick = "a"
options = []
"#;
        let exp = load_experiment(toml, Path::new("x.toml"), KNOWN).unwrap();
        assert_eq!(exp.attributes, default_attributes());
        assert_eq!(exp.environment, Environment::Local { processes: 1 });
    }

    #[test]
    fn test_parse_suite_entry() {
        assert_eq!(
            parse_suite_entry("gripper").unwrap(),
            SuiteEntry {
                domain: "gripper".to_string(),
                problem: None
            }
        );
        assert_eq!(
            parse_suite_entry("depot:p01.pddl").unwrap().problem.as_deref(),
            Some("p01.pddl")
        );
        assert!(parse_suite_entry("").is_err());
        assert!(parse_suite_entry("depot:").is_err());
        assert!(parse_suite_entry("a/b").is_err());
    }

    #[test]
    fn test_resolve_suite_sorts_and_finds_domain_files() {
        let exp = experiment();
        let tasks = resolve_suite(&exp.suite, Path::new("/bench"), &lister()).unwrap();
        let listed: Vec<(&str, &str, &str)> = tasks
            .iter()
            .map(|t| (t.domain.as_str(), t.problem.as_str(), t.domain_file.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("gripper", "prob01.pddl", "domain.pddl"),
                ("gripper", "prob02.pddl", "domain.pddl"),
                ("depot", "p01.pddl", "p01-domain.pddl"),
            ]
        );
    }

    #[test]
    fn test_resolve_suite_unknown_domain() {
        let suite = vec![parse_suite_entry("blocks").unwrap()];
        match resolve_suite(&suite, Path::new("/bench"), &lister()).unwrap_err() {
            ExperimentError::DomainNotFound { domain, path } => {
                assert_eq!(domain, "blocks");
                assert_eq!(path, PathBuf::from("/bench/blocks"));
            }
            other => panic!("Expected DomainNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_plan_runs_is_algorithm_major() {
        let exp = experiment();
        let runs = plan_runs(&exp, Path::new("/bench"), Path::new("/repo"), &lister()).unwrap();

        // 6 configs x 1 revision x 3 tasks
        assert_eq!(runs.len(), 18);
        assert_eq!(runs[0].id, 1);
        assert_eq!(runs[17].id, 18);
        assert_eq!(runs[0].algorithm, "[f, h^, fifo]");
        assert_eq!(runs[2].algorithm, "[f, h^, fifo]");
        assert_eq!(runs[3].algorithm, "f, h^-ff, <d>, fifo");

        let first = &runs[0];
        assert_eq!(
            first.argv,
            vec![
                "/repo/fast-downward.py",
                "--overall-time-limit",
                "5m",
                "/bench/gripper/domain.pddl",
                "/bench/gripper/prob01.pddl",
                "--search",
                "eager(criteria_tiebreaking([sum([g(), h]), h], tiebreaking_criteria=fifo))",
            ]
        );
    }

    #[test]
    fn test_overlapping_suite_entries_rejected() {
        let mut exp = experiment();
        exp.suite = vec![
            parse_suite_entry("gripper").unwrap(),
            parse_suite_entry("gripper:prob01.pddl").unwrap(),
        ];
        let err = plan_runs(&exp, Path::new("/bench"), Path::new("/repo"), &lister()).unwrap_err();
        match err {
            ExperimentError::DuplicateRunKey { key } => {
                assert_eq!(key, "[f, h^, fifo]-gripper-prob01.pddl");
            }
            other => panic!("Expected DuplicateRunKey, got: {other:?}"),
        }
    }

    #[test]
    fn test_algorithm_names_with_several_revisions() {
        let mut exp = experiment();
        exp.revisions = vec![
            "1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5".to_string(),
            "1250970671146f94691f5f3d2793462e0ea463d3".to_string(),
        ];
        assert_eq!(
            exp.algorithm_name(&exp.revisions[1], "fifo"),
            "1250970671-fifo"
        );
        assert_eq!(exp.algorithms().len(), 12);
    }
}
