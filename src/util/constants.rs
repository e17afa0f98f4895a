// PlateauLab - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "PlateauLab";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "PlateauLab";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parser definition limits
// =============================================================================

/// Maximum number of parsers that can be loaded (built-in + user).
pub const MAX_PARSERS: usize = 64;

/// Maximum size of a parser definition TOML file in bytes.
pub const MAX_PARSER_FILE_SIZE: u64 = 64 * 1024; // 64 KB

/// Maximum regex pattern length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of pattern + flag entries in a single parser.
pub const MAX_ENTRIES_PER_PARSER: usize = 256;

// =============================================================================
// Experiment limits
// =============================================================================

/// Maximum size of an experiment definition TOML file in bytes.
pub const MAX_EXPERIMENT_FILE_SIZE: u64 = 1024 * 1024; // 1 MB

/// Hard upper bound on random replicas per configuration family. Replica
/// labels use one digit (the tenth replica is `ro0`), so more would collide.
pub const MAX_RANDOM_REPLICAS: u32 = 10;

/// Number of runs grouped into one `runs-XXXXX-YYYYY` block directory.
pub const RUNS_PER_BLOCK: usize = 100;

/// Number of leading revision characters used in algorithm names.
pub const REVISION_PREFIX_LEN: usize = 10;

/// Task files that are never treated as problems.
pub const DOMAIN_FILE_GLOB: &str = "domain*.pddl";

/// Problem files inside a benchmark domain directory.
pub const PROBLEM_FILE_GLOB: &str = "*.pddl";

// =============================================================================
// Run layout file names
// =============================================================================

/// Captured planner output, written by the external runner.
pub const RUN_LOG_FILE_NAME: &str = "run.log";

/// Run metadata written by the build step.
pub const STATIC_PROPERTIES_FILE_NAME: &str = "static-properties";

/// Run metadata plus extracted metrics, written by the parse step.
pub const PROPERTIES_FILE_NAME: &str = "properties";

/// Planner command line written by the build step.
pub const COMMAND_FILE_NAME: &str = "command";

/// Experiment-level run listing written by the build step.
pub const PLAN_FILE_NAME: &str = "plan.json";

/// Suffix of the evaluation directory created next to an experiment directory.
pub const EVAL_DIR_SUFFIX: &str = "-eval";

/// Fetched dataset file name inside the evaluation directory.
pub const DATASET_FILE_NAME: &str = "properties.json";

/// Property recording why a run's log could not be parsed.
pub const PARSE_ERROR_PROPERTY: &str = "parse_error";

/// Property names the build and parse steps write themselves. A metric with
/// one of these names would overwrite run identity in `properties`.
pub const RESERVED_PROPERTY_NAMES: &[&str] = &[
    "id",
    "algorithm",
    "config_nick",
    "revision",
    "domain",
    "problem",
    "domain_file",
    "problem_file",
    "experiment_name",
    PARSE_ERROR_PROPERTY,
];

// =============================================================================
// Parse step limits
// =============================================================================

/// Maximum directory recursion depth when discovering run directories.
pub const DEFAULT_MAX_RUN_DEPTH: usize = 4;

/// Hard upper bound on run discovery depth.
pub const ABSOLUTE_MAX_RUN_DEPTH: usize = 16;

/// Maximum number of run directories processed in one parse step.
pub const DEFAULT_MAX_RUNS: usize = 200_000;

/// Minimum sensible value for the max-runs limit.
pub const MIN_MAX_RUNS: usize = 1;

/// Hard upper bound on max runs (prevents configuration mistakes).
pub const ABSOLUTE_MAX_RUNS: usize = 2_000_000;

/// Log size in bytes above which the file is memory-mapped instead of read.
pub const DEFAULT_LARGE_LOG_THRESHOLD: u64 = 64 * 1024 * 1024; // 64 MB

/// Default number of worker threads for parallel parsing.
/// 0 means auto-detect (use available CPU cores).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Hard upper bound on worker threads.
pub const MAX_WORKER_THREADS: usize = 512;

/// Retry limits for transient I/O errors while reading run logs.
pub const MAX_READ_RETRIES: u32 = 3;

/// Backoff between read retries, indexed by attempt.
pub const READ_RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Reports
// =============================================================================

/// Label of the row aggregating all domains.
pub const SUMMARY_ROW_LABEL: &str = "Summary";

/// Non-positive values are raised to this before taking a geometric mean.
pub const GEOMETRIC_MEAN_FLOOR: f64 = 0.1;

/// Decimal places used when rendering non-integral report cells.
pub const REPORT_DECIMALS: usize = 2;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// User parsers subdirectory name.
pub const PARSERS_DIR_NAME: &str = "parsers";
