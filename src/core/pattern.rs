// PlateauLab - core/pattern.rs
//
// Parser definition loading, validation, and compilation.
// Core layer: accepts TOML strings, never touches the filesystem.
// I/O is handled by app::parser_mgr which feeds content here.

use crate::core::model::{FlagEntry, MetricParser, PatternEntry, ValueKind};
use crate::util::constants;
use crate::util::error::ParserDefError;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw TOML parser definition as deserialized from a .toml file.
/// This is validated and compiled into a `MetricParser` for runtime use.
#[derive(Debug, Deserialize)]
pub struct ParserDefinition {
    pub parser: ParserMeta,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternDef>,
    #[serde(default, rename = "flag")]
    pub flags: Vec<FlagDef>,
}

#[derive(Debug, Deserialize)]
pub struct ParserMeta {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct PatternDef {
    pub name: String,
    pub regex: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
pub struct FlagDef {
    pub name: String,
    pub regex: String,
}

// =============================================================================
// Validation and compilation
// =============================================================================

/// Parse a TOML string into a `ParserDefinition`.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_parser_toml(
    toml_content: &str,
    source_path: &Path,
) -> Result<ParserDefinition, ParserDefError> {
    toml::from_str(toml_content).map_err(|e| ParserDefError::TomlParse {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Validate a `ParserDefinition` and compile it into a runtime `MetricParser`.
///
/// Validates:
/// - `parser.id`, `parser.name` and every metric name are non-empty
/// - metric names are unique within the parser
/// - regexes compile, stay within the length limit, and have exactly one
///   capture group (patterns) or none (flags)
pub fn validate_and_compile(
    def: ParserDefinition,
    source_path: &Path,
    is_builtin: bool,
) -> Result<MetricParser, ParserDefError> {
    let id = def.parser.id.trim().to_string();

    if id.is_empty() {
        return Err(ParserDefError::MissingField {
            parser_id: "(empty)".to_string(),
            field: "parser.id",
        });
    }
    if def.parser.name.trim().is_empty() {
        return Err(ParserDefError::MissingField {
            parser_id: id,
            field: "parser.name",
        });
    }

    let entry_count = def.patterns.len() + def.flags.len();
    if entry_count > constants::MAX_ENTRIES_PER_PARSER {
        return Err(ParserDefError::TooManyEntries {
            parser_id: id,
            count: entry_count,
            max: constants::MAX_ENTRIES_PER_PARSER,
        });
    }
    if entry_count == 0 {
        tracing::warn!(
            parser_id = %id,
            source = %source_path.display(),
            "Parser defines no patterns or flags; it will never bind a metric"
        );
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut claim_name = |name: &str| -> Result<(), ParserDefError> {
        if name.trim().is_empty() {
            return Err(ParserDefError::MissingField {
                parser_id: id.clone(),
                field: "pattern.name",
            });
        }
        if constants::RESERVED_PROPERTY_NAMES.contains(&name) {
            return Err(ParserDefError::ReservedMetric {
                parser_id: id.clone(),
                metric: name.to_string(),
            });
        }
        if !seen.insert(name.to_string()) {
            return Err(ParserDefError::DuplicateMetric {
                parser_id: id.clone(),
                metric: name.to_string(),
            });
        }
        Ok(())
    };

    let mut patterns = Vec::with_capacity(def.patterns.len());
    for p in def.patterns {
        claim_name(&p.name)?;
        let regex = compile_regex(&id, &p.name, &p.regex, 1)?;
        patterns.push(PatternEntry {
            name: p.name,
            regex,
            kind: p.kind,
            required: p.required,
        });
    }

    let mut flags = Vec::with_capacity(def.flags.len());
    for f in def.flags {
        claim_name(&f.name)?;
        let regex = compile_regex(&id, &f.name, &f.regex, 0)?;
        flags.push(FlagEntry {
            name: f.name,
            regex,
        });
    }

    Ok(MetricParser {
        id,
        name: def.parser.name,
        description: def.parser.description,
        patterns,
        flags,
        is_builtin,
    })
}

/// Compile a regex with length validation and capture-group count check.
fn compile_regex(
    parser_id: &str,
    metric: &str,
    pattern: &str,
    expected_groups: usize,
) -> Result<Regex, ParserDefError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(ParserDefError::RegexTooLong {
            parser_id: parser_id.to_string(),
            metric: metric.to_string(),
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    let regex = Regex::new(pattern).map_err(|e| ParserDefError::InvalidRegex {
        parser_id: parser_id.to_string(),
        metric: metric.to_string(),
        pattern: pattern.to_string(),
        source: e,
    })?;

    // captures_len() counts the implicit whole-match group 0.
    let found = regex.captures_len() - 1;
    if found != expected_groups {
        return Err(ParserDefError::CaptureGroupCount {
            parser_id: parser_id.to_string(),
            metric: metric.to_string(),
            expected: expected_groups,
            found,
        });
    }

    Ok(regex)
}

// =============================================================================
// Built-in parsers (embedded at compile time)
// =============================================================================

/// Embedded TOML content for built-in parsers.
/// Each tuple is (filename, TOML content).
pub fn builtin_parser_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("plateau.toml", include_str!("../../parsers/plateau.toml")),
        ("landmark.toml", include_str!("../../parsers/landmark.toml")),
        ("search.toml", include_str!("../../parsers/search.toml")),
        ("planner.toml", include_str!("../../parsers/planner.toml")),
    ]
}

/// Load and validate all built-in parsers.
///
/// Invalid parsers are logged as errors and skipped (non-fatal).
pub fn load_builtin_parsers() -> Vec<MetricParser> {
    let mut parsers = Vec::new();
    let mut failures = 0usize;

    for (filename, content) in builtin_parser_sources() {
        let path = Path::new("<builtin>").join(filename);
        match parse_parser_toml(content, &path)
            .and_then(|def| validate_and_compile(def, &path, true))
        {
            Ok(parser) => {
                tracing::debug!(parser_id = %parser.id, "Loaded built-in parser");
                parsers.push(parser);
            }
            Err(e) => {
                tracing::error!(file = filename, error = %e, "Failed to load built-in parser");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        tracing::warn!(count = failures, "Some built-in parsers failed to load");
    }

    parsers
}

// =============================================================================
// Tests
// =============================================================================
