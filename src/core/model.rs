// PlateauLab - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies. These types are the shared vocabulary across all layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// Metric values
// =============================================================================

/// Declared type of a pattern's captured value.
///
/// The set is closed: every pattern converts its capture group with one of
/// these two parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Float,
}

impl ValueKind {
    /// Keyword used in parser definitions and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A typed metric extracted from a run log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    /// Numeric view used by report aggregation.
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Int(v) => *v as f64,
            MetricValue::Float(v) => *v,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Metric name to value. A metric that was not found has no entry.
pub type Metrics = BTreeMap<String, MetricValue>;

// =============================================================================
// Metric parser (runtime representation)
// =============================================================================

/// One `(name, regex, type)` triple of a parser.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    /// Metric name the captured value is bound to.
    pub name: String,

    /// Compiled regex with exactly one capture group.
    pub regex: regex::Regex,

    /// Conversion applied to the captured text.
    pub kind: ValueKind,

    /// A required metric that matches no line is a parse error.
    pub required: bool,
}

/// A presence test: binds `1` when any line matches, `0` otherwise.
#[derive(Debug, Clone)]
pub struct FlagEntry {
    pub name: String,
    pub regex: regex::Regex,
}

/// Runtime representation of a parser after TOML parsing and regex
/// compilation. Immutable once built; applied once per log file.
#[derive(Debug, Clone)]
pub struct MetricParser {
    /// Unique parser identifier (e.g. "plateau").
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Description of what the parser collects.
    pub description: String,

    /// Value patterns in declaration order.
    pub patterns: Vec<PatternEntry>,

    /// Presence flags in declaration order.
    pub flags: Vec<FlagEntry>,

    /// Whether this is a built-in parser (true) or user-defined (false).
    pub is_builtin: bool,
}

impl MetricParser {
    /// Names of all metrics this parser can bind, patterns first.
    pub fn metric_names(&self) -> Vec<&str> {
        self.patterns
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.flags.iter().map(|f| f.name.as_str()))
            .collect()
    }
}

// =============================================================================
// Experiment vocabulary
// =============================================================================

/// Rule the planner uses to order equally-ranked states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreaking {
    Fifo,
    Lifo,
    Random,
}

impl TieBreaking {
    /// Keyword understood by the planner's `tiebreaking_criteria` option.
    pub fn keyword(&self) -> &'static str {
        match self {
            TieBreaking::Fifo => "fifo",
            TieBreaking::Lifo => "lifo",
            TieBreaking::Random => "random",
        }
    }

    /// Only random tie-breaking varies between repetitions.
    pub fn is_stochastic(&self) -> bool {
        matches!(self, TieBreaking::Random)
    }
}

/// One named planner configuration to benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Display name, also the algorithm suffix in reports.
    pub nick: String,

    /// Arguments placed after the task files (e.g. `--search ...`).
    pub component_options: Vec<String>,

    /// Arguments placed before the task files (e.g. time limits).
    pub driver_options: Vec<String>,
}

/// Where the external runner is expected to execute the runs.
///
/// Recorded in the plan for the runner; never acted upon here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Environment {
    Local {
        #[serde(default = "default_processes")]
        processes: usize,
    },
    Slurm {
        partition: String,
        #[serde(default)]
        email: Option<String>,
        #[serde(default)]
        export: Vec<String>,
    },
}

fn default_processes() -> usize {
    1
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Local {
            processes: default_processes(),
        }
    }
}

/// A suite entry: a whole domain or a single problem of a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteEntry {
    pub domain: String,
    pub problem: Option<String>,
}

/// One configuration on one benchmark instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// 1-based run number, unique within an experiment.
    pub id: usize,

    /// Report column key (revision prefix + nick).
    pub algorithm: String,

    pub config_nick: String,
    pub revision: String,
    pub domain: String,
    pub problem: String,
    pub domain_file: PathBuf,
    pub problem_file: PathBuf,

    /// Full planner command line.
    pub argv: Vec<String>,
}

impl Run {
    /// Zero-padded directory name for this run.
    pub fn dir_name(&self) -> String {
        format!("{:05}", self.id)
    }

    /// Dataset key, unique per experiment.
    pub fn key(&self) -> String {
        run_key(&self.algorithm, &self.domain, &self.problem)
    }
}

/// Dataset key shared by the fetch step and reports.
pub fn run_key(algorithm: &str, domain: &str, problem: &str) -> String {
    format!("{algorithm}-{domain}-{problem}")
}

/// A run directory found on disk that holds a `run.log`.
#[derive(Debug, Clone)]
pub struct DiscoveredRun {
    /// The run directory (parent of the log).
    pub dir: PathBuf,

    /// Path of `run.log`.
    pub log_path: PathBuf,

    /// Log size in bytes at discovery time.
    pub log_size: u64,

    /// Logs at or above the large-log threshold are memory-mapped.
    pub is_large: bool,
}

/// Contents of one run's `properties` file: static properties plus metrics.
pub type RunProperties = serde_json::Map<String, serde_json::Value>;

/// Fetched experiment data keyed by `run_key`.
pub type Dataset = BTreeMap<String, RunProperties>;

// =============================================================================
// Report vocabulary
// =============================================================================

/// Function used to aggregate an attribute over tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    ArithmeticMean,
    GeometricMean,
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregation {
    pub fn label(&self) -> &'static str {
        match self {
            Aggregation::ArithmeticMean => "arithmetic_mean",
            Aggregation::GeometricMean => "geometric_mean",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }
}

/// Column display metadata for one metric in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,

    /// Lower values are better when true.
    #[serde(default = "default_min_wins")]
    pub min_wins: bool,

    #[serde(default)]
    pub function: Aggregation,

    /// When false, only tasks with a value for every algorithm are aggregated.
    #[serde(default)]
    pub absolute: bool,
}

fn default_min_wins() -> bool {
    true
}

impl Attribute {
    pub fn new(name: &str, min_wins: bool, function: Aggregation, absolute: bool) -> Self {
        Self {
            name: name.to_string(),
            min_wins,
            function,
            absolute,
        }
    }
}

/// Attributes shown when an experiment declares none.
pub fn default_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("coverage", false, Aggregation::Sum, true),
        Attribute::new("expansions", true, Aggregation::GeometricMean, false),
        Attribute::new("search_time", true, Aggregation::GeometricMean, false),
        Attribute::new(
            "max_entries_per_plateau",
            false,
            Aggregation::ArithmeticMean,
            false,
        ),
        Attribute::new("max_depth", false, Aggregation::ArithmeticMean, false),
        Attribute::new("max_depth_width", false, Aggregation::ArithmeticMean, false),
        Attribute::new(
            "max_leveled_plateaus",
            false,
            Aggregation::ArithmeticMean,
            false,
        ),
    ]
}
