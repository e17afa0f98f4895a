// PlateauLab - platform/env.rs
//
// Environment variable lookup for benchmark and planner directories.

use crate::util::error::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;

/// Source of environment variables.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }
}

/// A fixed set of variables.
impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolve a variable that must name an existing directory.
///
/// Unset and empty values are both treated as missing.
pub fn require_dir<E: EnvSource + ?Sized>(env: &E, name: &str) -> Result<PathBuf, ConfigError> {
    let value = env
        .var(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar {
            name: name.to_string(),
        })?;
    let path = PathBuf::from(value);
    if !path.is_dir() {
        return Err(ConfigError::EnvVarNotADirectory {
            name: name.to_string(),
            path,
        });
    }
    tracing::debug!(var = name, path = %path.display(), "Resolved directory from environment");
    Ok(path)
}
