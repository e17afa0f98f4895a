// PlateauLab - platform/config.rs
//
// Platform-specific directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Resolved platform paths for PlateauLab configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/plateaulab/).
    pub config_dir: PathBuf,

    /// User parser directory (e.g. ~/.config/plateaulab/parsers/).
    pub user_parsers_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let user_parsers_dir = config_dir.join(constants::PARSERS_DIR_NAME);

            tracing::debug!(
                config = %config_dir.display(),
                parsers = %user_parsers_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                user_parsers_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                user_parsers_dir: fallback.join(constants::PARSERS_DIR_NAME),
                config_dir: fallback,
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file still works with
/// an older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[parsing]` section.
    pub parsing: ParsingSection,
    /// `[parsers]` section.
    pub parsers: ParsersSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[parsing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ParsingSection {
    /// Number of worker threads (0 = auto).
    pub worker_threads: Option<usize>,
    /// Logs at or above this size are memory-mapped.
    pub large_log_threshold_bytes: Option<u64>,
    /// Maximum run directories per parse step.
    pub max_runs: Option<usize>,
    /// Maximum directory depth searched for run directories.
    pub max_depth: Option<usize>,
}

/// `[parsers]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ParsersSection {
    /// Additional parser directory, overriding the platform default.
    pub user_parser_directory: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Parsing --
    /// Worker threads for the parse step (0 = all cores).
    pub worker_threads: usize,
    /// Logs at or above this size are memory-mapped.
    pub large_log_threshold: u64,
    /// Maximum run directories per parse step.
    pub max_runs: usize,
    /// Maximum directory depth searched for run directories.
    pub max_depth: usize,

    // -- Parsers --
    /// User parser directory from config, if set.
    pub user_parser_dir: Option<PathBuf>,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            large_log_threshold: constants::DEFAULT_LARGE_LOG_THRESHOLD,
            max_runs: constants::DEFAULT_MAX_RUNS,
            max_depth: constants::DEFAULT_MAX_RUN_DEPTH,
            user_parser_dir: None,
            log_level: None,
            log_file: None,
        }
    }
}

/// Load and validate `config.toml` from the given config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings. An unparseable file
/// yields defaults with a warning so the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) => {
            warnings.push(format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            ));
            return (AppConfig::default(), warnings);
        }
    };

    let (config, parse_warnings) = parse_config(&content, &config_path);
    warnings.extend(parse_warnings);
    (config, warnings)
}

/// Validate config.toml content. `config_path` is used in messages only.
pub fn parse_config(content: &str, config_path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let raw: RawConfig = match toml::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            warnings.push(format!(
                "Failed to parse config file '{}': {e}. Using defaults. \
                 See config.example.toml for the expected format.",
                config_path.display()
            ));
            return (AppConfig::default(), warnings);
        }
    };

    tracing::debug!(path = %config_path.display(), "Loaded config.toml");

    let mut config = AppConfig::default();

    // -- Parsing: worker_threads --
    if let Some(threads) = raw.parsing.worker_threads {
        if threads <= constants::MAX_WORKER_THREADS {
            config.worker_threads = threads;
        } else {
            warnings.push(format!(
                "[parsing] worker_threads = {threads} is out of range (0-{}). Using default ({}).",
                constants::MAX_WORKER_THREADS,
                constants::DEFAULT_WORKER_THREADS,
            ));
        }
    }

    // -- Parsing: large_log_threshold_bytes --
    if let Some(bytes) = raw.parsing.large_log_threshold_bytes {
        if bytes > 0 {
            config.large_log_threshold = bytes;
        } else {
            warnings.push(format!(
                "[parsing] large_log_threshold_bytes must be positive. Using default ({}).",
                constants::DEFAULT_LARGE_LOG_THRESHOLD,
            ));
        }
    }

    // -- Parsing: max_runs --
    if let Some(runs) = raw.parsing.max_runs {
        if (constants::MIN_MAX_RUNS..=constants::ABSOLUTE_MAX_RUNS).contains(&runs) {
            config.max_runs = runs;
        } else {
            warnings.push(format!(
                "[parsing] max_runs = {runs} is out of range ({}-{}). Using default ({}).",
                constants::MIN_MAX_RUNS,
                constants::ABSOLUTE_MAX_RUNS,
                constants::DEFAULT_MAX_RUNS,
            ));
        }
    }

    // -- Parsing: max_depth --
    if let Some(depth) = raw.parsing.max_depth {
        if (1..=constants::ABSOLUTE_MAX_RUN_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            warnings.push(format!(
                "[parsing] max_depth = {depth} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_RUN_DEPTH,
                constants::DEFAULT_MAX_RUN_DEPTH,
            ));
        }
    }

    // -- Parsers: user_parser_directory --
    if let Some(ref dir) = raw.parsers.user_parser_directory {
        if !dir.trim().is_empty() {
            config.user_parser_dir = Some(PathBuf::from(dir));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default ({}).",
                constants::DEFAULT_LOG_LEVEL,
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    (config, warnings)
}
