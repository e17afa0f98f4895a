// PlateauLab - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; every variant keeps its cause so the
// binary can print the full chain.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all PlateauLab operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum PlateauLabError {
    /// Parser definition loading or validation failed.
    ParserDef(ParserDefError),

    /// Metric extraction from a run log failed.
    Extract(ExtractError),

    /// Experiment definition loading, validation, or planning failed.
    Experiment(ExperimentError),

    /// Run directory discovery failed.
    Discovery(DiscoveryError),

    /// A build/parse/fetch step failed.
    Step(StepError),

    /// Report aggregation failed.
    Report(ReportError),

    /// Export operation failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for PlateauLabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParserDef(e) => write!(f, "Parser definition error: {e}"),
            Self::Extract(e) => write!(f, "Extraction error: {e}"),
            Self::Experiment(e) => write!(f, "Experiment error: {e}"),
            Self::Discovery(e) => write!(f, "Discovery error: {e}"),
            Self::Step(e) => write!(f, "Step error: {e}"),
            Self::Report(e) => write!(f, "Report error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for PlateauLabError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ParserDef(e) => Some(e),
            Self::Extract(e) => Some(e),
            Self::Experiment(e) => Some(e),
            Self::Discovery(e) => Some(e),
            Self::Step(e) => Some(e),
            Self::Report(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser definition errors
// ---------------------------------------------------------------------------

/// Errors related to parser definition loading and validation.
#[derive(Debug)]
pub enum ParserDefError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Parser file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing or empty.
    MissingField {
        parser_id: String,
        field: &'static str,
    },

    /// A regex pattern is invalid.
    InvalidRegex {
        parser_id: String,
        metric: String,
        pattern: String,
        source: regex::Error,
    },

    /// A regex pattern exceeds the maximum allowed length.
    RegexTooLong {
        parser_id: String,
        metric: String,
        length: usize,
        max_length: usize,
    },

    /// A value pattern must have exactly one capture group; a flag must have none.
    CaptureGroupCount {
        parser_id: String,
        metric: String,
        expected: usize,
        found: usize,
    },

    /// Two entries of the same parser bind the same metric name.
    DuplicateMetric { parser_id: String, metric: String },

    /// A metric is named like a property the build or parse step writes.
    ReservedMetric { parser_id: String, metric: String },

    /// A single parser has too many entries.
    TooManyEntries {
        parser_id: String,
        count: usize,
        max: usize,
    },

    /// Maximum number of parsers exceeded.
    TooManyParsers { count: usize, max: usize },

    /// I/O error reading a parser file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ParserDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Parser '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { parser_id, field } => {
                write!(f, "Parser '{parser_id}': missing required field '{field}'")
            }
            Self::InvalidRegex {
                parser_id,
                metric,
                pattern,
                source,
            } => write!(
                f,
                "Parser '{parser_id}': invalid regex for '{metric}' ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                parser_id,
                metric,
                length,
                max_length,
            } => write!(
                f,
                "Parser '{parser_id}': regex for '{metric}' is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::CaptureGroupCount {
                parser_id,
                metric,
                expected,
                found,
            } => write!(
                f,
                "Parser '{parser_id}': regex for '{metric}' has {found} capture group(s), \
                 expected {expected}"
            ),
            Self::DuplicateMetric { parser_id, metric } => {
                write!(f, "Parser '{parser_id}': metric '{metric}' is defined twice")
            }
            Self::ReservedMetric { parser_id, metric } => write!(
                f,
                "Parser '{parser_id}': metric name '{metric}' is reserved for run properties"
            ),
            Self::TooManyEntries {
                parser_id,
                count,
                max,
            } => write!(
                f,
                "Parser '{parser_id}' has {count} entries, maximum is {max}"
            ),
            Self::TooManyParsers { count, max } => {
                write!(f, "Too many parsers loaded ({count}), maximum is {max}")
            }
            Self::Io { path, source } => {
                write!(f, "I/O error reading parser '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ParserDefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParserDefError> for PlateauLabError {
    fn from(e: ParserDefError) -> Self {
        Self::ParserDef(e)
    }
}

// ---------------------------------------------------------------------------
// Extraction errors
// ---------------------------------------------------------------------------

/// Errors produced while extracting metrics from a log's text.
///
/// Any of these is fatal for the parse step of the affected run.
#[derive(Debug)]
pub enum ExtractError {
    /// A matched capture group could not be converted to the declared type.
    Conversion {
        metric: String,
        raw: String,
        expected: &'static str,
        line_number: u64,
        reason: String,
    },

    /// A pattern marked `required` matched no line.
    MissingRequired { parser_id: String, metric: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversion {
                metric,
                raw,
                expected,
                line_number,
                reason,
            } => write!(
                f,
                "line {line_number}: cannot convert '{raw}' to {expected} for '{metric}': {reason}"
            ),
            Self::MissingRequired { parser_id, metric } => write!(
                f,
                "required metric '{metric}' of parser '{parser_id}' not found"
            ),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<ExtractError> for PlateauLabError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

// ---------------------------------------------------------------------------
// Experiment errors
// ---------------------------------------------------------------------------

/// Errors related to experiment definitions and run planning.
#[derive(Debug)]
pub enum ExperimentError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Experiment file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing or empty.
    MissingField { field: &'static str },

    /// No configuration remains after family expansion.
    NoConfigurations,

    /// Two configurations share a nick.
    DuplicateNick { nick: String },

    /// A configuration family is malformed.
    InvalidFamily { family: String, reason: String },

    /// A suite entry is not `domain` or `domain:problem.pddl`.
    InvalidSuiteEntry { entry: String },

    /// The experiment selects a parser that is not loaded.
    UnknownParser { id: String },

    /// The environment section is inconsistent.
    InvalidEnvironment { reason: String },

    /// A revision cannot be planned.
    InvalidRevision { revision: String, reason: String },

    /// Two planned runs share a dataset key.
    DuplicateRunKey { key: String },

    /// A report attribute is declared twice.
    DuplicateAttribute { name: String },

    /// A suite domain directory does not exist under the benchmarks directory.
    DomainNotFound { domain: String, path: PathBuf },

    /// A problem listed in the suite does not exist.
    ProblemNotFound { domain: String, problem: String },

    /// No domain file could be resolved for a problem.
    NoDomainFile { domain: String, problem: String },

    /// A benchmark file-name pattern does not compile.
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// I/O error while reading the definition or listing benchmarks.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Experiment '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::NoConfigurations => write!(f, "experiment defines no configurations"),
            Self::DuplicateNick { nick } => {
                write!(f, "configuration nick '{nick}' is used more than once")
            }
            Self::InvalidFamily { family, reason } => {
                write!(f, "configuration family '{family}': {reason}")
            }
            Self::InvalidSuiteEntry { entry } => write!(
                f,
                "suite entry '{entry}' is not of the form 'domain' or 'domain:problem.pddl'"
            ),
            Self::UnknownParser { id } => write!(f, "unknown parser '{id}'"),
            Self::InvalidEnvironment { reason } => write!(f, "invalid environment: {reason}"),
            Self::InvalidRevision { revision, reason } => {
                write!(f, "revision '{revision}' {reason}")
            }
            Self::DuplicateRunKey { key } => write!(
                f,
                "run '{key}' is planned more than once; check for overlapping suite entries"
            ),
            Self::DuplicateAttribute { name } => {
                write!(f, "report attribute '{name}' is declared more than once")
            }
            Self::DomainNotFound { domain, path } => write!(
                f,
                "domain '{domain}' not found at '{}'",
                path.display()
            ),
            Self::ProblemNotFound { domain, problem } => {
                write!(f, "problem '{problem}' not found in domain '{domain}'")
            }
            Self::NoDomainFile { domain, problem } => write!(
                f,
                "no domain file found for problem '{problem}' in domain '{domain}'"
            ),
            Self::InvalidPattern { pattern, source } => {
                write!(f, "invalid file pattern '{pattern}': {source}")
            }
            Self::Io { path, source } => {
                write!(f, "I/O error on '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExperimentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidPattern { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ExperimentError> for PlateauLabError {
    fn from(e: ExperimentError) -> Self {
        Self::Experiment(e)
    }
}

// ---------------------------------------------------------------------------
// Discovery errors
// ---------------------------------------------------------------------------

/// Errors related to run directory discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// The experiment directory does not exist.
    RootNotFound { path: PathBuf },

    /// The experiment path is not a directory.
    NotADirectory { path: PathBuf },

    /// Maximum run count exceeded during discovery.
    MaxRunsExceeded { max: usize },

    /// Walkdir traversal error that prevents discovery altogether.
    Traversal {
        path: PathBuf,
        source: walkdir::Error,
    },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "Experiment directory '{}' does not exist", path.display())
            }
            Self::NotADirectory { path } => {
                write!(f, "Experiment path '{}' is not a directory", path.display())
            }
            Self::MaxRunsExceeded { max } => write!(
                f,
                "Discovery stopped: exceeded maximum of {max} runs. \
                 Increase [parsing] max_runs in config."
            ),
            Self::Traversal { path, source } => {
                write!(f, "Error traversing '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Traversal { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DiscoveryError> for PlateauLabError {
    fn from(e: DiscoveryError) -> Self {
        Self::Discovery(e)
    }
}

// ---------------------------------------------------------------------------
// Step errors
// ---------------------------------------------------------------------------

/// Errors raised by the build, parse, and fetch steps.
#[derive(Debug)]
pub enum StepError {
    /// The build step refuses to write into a non-empty directory.
    DirectoryNotEmpty { path: PathBuf },

    /// Two runs map to the same dataset key.
    DuplicateRunKey {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A properties file is not valid JSON.
    InvalidProperties {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// One or more runs could not be parsed.
    RunsFailed { failed: usize, total: usize },

    /// The parse worker pool could not be started.
    ThreadPool {
        threads: usize,
        source: rayon::ThreadPoolBuildError,
    },

    /// JSON serialisation of step output failed.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// I/O error while reading or writing step files.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryNotEmpty { path } => write!(
                f,
                "'{}' already exists and is not empty (use --overwrite)",
                path.display()
            ),
            Self::DuplicateRunKey { key, first, second } => write!(
                f,
                "run key '{key}' appears in both '{}' and '{}'",
                first.display(),
                second.display()
            ),
            Self::InvalidProperties { path, source } => {
                write!(f, "invalid properties '{}': {source}", path.display())
            }
            Self::RunsFailed { failed, total } => {
                write!(f, "{failed} of {total} runs could not be parsed")
            }
            Self::ThreadPool { threads, source } => {
                write!(f, "cannot start {threads} parse workers: {source}")
            }
            Self::Json { path, source } => {
                write!(f, "cannot serialise '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "I/O error on '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidProperties { source, .. } => Some(source),
            Self::ThreadPool { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StepError> for PlateauLabError {
    fn from(e: StepError) -> Self {
        Self::Step(e)
    }
}

// ---------------------------------------------------------------------------
// Report errors
// ---------------------------------------------------------------------------

/// Errors related to report aggregation.
#[derive(Debug)]
pub enum ReportError {
    /// The dataset contains no runs.
    EmptyDataset,

    /// No attributes were requested.
    NoAttributes,

    /// A run record lacks the fields needed to place it in a table.
    MissingRunField { key: String, field: &'static str },

    /// The dataset file is not valid JSON.
    InvalidDataset {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDataset => write!(f, "dataset contains no runs (run 'fetch' first)"),
            Self::NoAttributes => write!(f, "no report attributes selected"),
            Self::MissingRunField { key, field } => {
                write!(f, "run '{key}' has no '{field}' property")
            }
            Self::InvalidDataset { path, source } => {
                write!(f, "invalid dataset '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidDataset { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ReportError> for PlateauLabError {
    fn from(e: ReportError) -> Self {
        Self::Report(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to report export.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for PlateauLabError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration and the process environment.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is not set.
    MissingEnvVar { name: String },

    /// An environment variable must point to an existing directory.
    EnvVarNotADirectory { name: String, path: PathBuf },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEnvVar { name } => {
                write!(f, "environment variable '{name}' is not set")
            }
            Self::EnvVarNotADirectory { name, path } => write!(
                f,
                "environment variable '{name}' points to '{}', which is not a directory",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for PlateauLabError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for PlateauLab results.
pub type Result<T> = std::result::Result<T, PlateauLabError>;
