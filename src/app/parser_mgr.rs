// PlateauLab - app/parser_mgr.rs
//
// Loads metric parsers from built-in sources (embedded in the binary) and
// user-defined TOML files on disk. User parsers override built-in parsers
// with the same id.

use crate::core::model::MetricParser;
use crate::core::pattern;
use crate::platform::fs;
use crate::util::constants;
use crate::util::error::{ExperimentError, ParserDefError};
use std::path::Path;

/// Load all available parsers: built-in first, then user-defined overrides.
///
/// Invalid user parsers are logged and skipped (non-fatal); the returned
/// error list lets the caller surface them.
pub fn load_all_parsers(
    user_parser_dir: Option<&Path>,
) -> (Vec<MetricParser>, Vec<ParserDefError>) {
    let mut parsers = pattern::load_builtin_parsers();
    let mut errors = Vec::new();

    tracing::debug!(builtin_count = parsers.len(), "Loaded built-in parsers");

    if let Some(dir) = user_parser_dir {
        if dir.is_dir() {
            let (user_parsers, user_errors) = load_user_parsers(dir);
            errors.extend(user_errors);

            for user_parser in user_parsers {
                if let Some(pos) = parsers.iter().position(|p| p.id == user_parser.id) {
                    tracing::info!(
                        parser_id = %user_parser.id,
                        "User parser overrides built-in"
                    );
                    parsers[pos] = user_parser;
                } else {
                    tracing::debug!(parser_id = %user_parser.id, "Loaded user-defined parser");
                    parsers.push(user_parser);
                }
            }
        } else {
            tracing::debug!(
                dir = %dir.display(),
                "User parser directory does not exist (skipping)"
            );
        }
    }

    if parsers.len() > constants::MAX_PARSERS {
        tracing::warn!(
            count = parsers.len(),
            max = constants::MAX_PARSERS,
            "Too many parsers loaded, truncating"
        );
        errors.push(ParserDefError::TooManyParsers {
            count: parsers.len(),
            max: constants::MAX_PARSERS,
        });
        parsers.truncate(constants::MAX_PARSERS);
    }

    for e in &errors {
        tracing::warn!(error = %e, "Parser skipped");
    }
    tracing::debug!(total = parsers.len(), "Parser loading complete");

    (parsers, errors)
}

/// Load user-defined parsers from a directory, in file-name order.
fn load_user_parsers(dir: &Path) -> (Vec<MetricParser>, Vec<ParserDefError>) {
    let mut parsers = Vec::new();
    let mut errors = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(ParserDefError::Io {
                path: dir.to_path_buf(),
                source: e,
            });
            return (parsers, errors);
        }
    };

    let mut paths = Vec::new();
    for entry_result in entries {
        match entry_result {
            Ok(entry) => paths.push(entry.path()),
            Err(e) => errors.push(ParserDefError::Io {
                path: dir.to_path_buf(),
                source: e,
            }),
        }
    }
    paths.retain(|p| p.extension().and_then(|e| e.to_str()) == Some("toml"));
    paths.sort();

    for path in paths {
        let content = match fs::read_bounded(&path, constants::MAX_PARSER_FILE_SIZE) {
            Ok(Ok(c)) => c,
            Ok(Err(size)) => {
                errors.push(ParserDefError::FileTooLarge {
                    path,
                    size,
                    max_size: constants::MAX_PARSER_FILE_SIZE,
                });
                continue;
            }
            Err(e) => {
                errors.push(ParserDefError::Io { path, source: e });
                continue;
            }
        };

        match pattern::parse_parser_toml(&content, &path)
            .and_then(|def| pattern::validate_and_compile(def, &path, false))
        {
            Ok(p) => parsers.push(p),
            Err(e) => errors.push(e),
        }
    }

    (parsers, errors)
}

/// Select parsers by id, in the order given.
///
/// An empty selection returns every loaded parser.
pub fn select_parsers<'a>(
    parsers: &'a [MetricParser],
    ids: &[String],
) -> Result<Vec<&'a MetricParser>, ExperimentError> {
    if ids.is_empty() {
        return Ok(parsers.iter().collect());
    }
    ids.iter()
        .map(|id| {
            parsers
                .iter()
                .find(|p| &p.id == id)
                .ok_or_else(|| ExperimentError::UnknownParser { id: id.clone() })
        })
        .collect()
}
