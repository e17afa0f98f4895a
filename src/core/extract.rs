// PlateauLab - core/extract.rs
//
// Metric extraction from run log text using compiled parsers.
// Core layer: accepts text, never touches the filesystem directly.
//
// Semantics per pattern: the first line that matches wins; its single capture
// group is converted with the declared value kind. No matching line leaves the
// metric absent. A capture that does not convert is an error, never a default.

use crate::core::model::{MetricParser, MetricValue, Metrics, ValueKind};
use crate::util::constants;
use crate::util::error::ExtractError;

/// Apply one parser to a log's text.
pub fn extract_metrics(content: &str, parser: &MetricParser) -> Result<Metrics, ExtractError> {
    extract_from_lines(content.lines(), parser)
}

/// Apply one parser to a sequence of lines.
///
/// A single pass over the lines resolves every pattern; the scan stops early
/// once all patterns and flags have matched.
pub fn extract_from_lines<'a, I>(lines: I, parser: &MetricParser) -> Result<Metrics, ExtractError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut values: Vec<Option<MetricValue>> = vec![None; parser.patterns.len()];
    let mut flags: Vec<bool> = vec![false; parser.flags.len()];
    let mut unresolved = parser.patterns.len() + parser.flags.len();

    for (line_idx, line) in lines.into_iter().enumerate() {
        if unresolved == 0 {
            break;
        }
        let line_number = (line_idx as u64) + 1;

        for (slot, pattern) in values.iter_mut().zip(&parser.patterns) {
            if slot.is_some() {
                continue;
            }
            let Some(caps) = pattern.regex.captures(line) else {
                continue;
            };
            // Compilation guarantees exactly one group; it may still be unset
            // when it sits in an untaken alternation branch.
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let value = convert(raw, pattern.kind).map_err(|reason| {
                ExtractError::Conversion {
                    metric: pattern.name.clone(),
                    raw: preview(raw),
                    expected: pattern.kind.label(),
                    line_number,
                    reason,
                }
            })?;
            tracing::trace!(
                parser = %parser.id,
                metric = %pattern.name,
                line_number,
                %value,
                "Pattern matched"
            );
            *slot = Some(value);
            unresolved -= 1;
        }

        for (seen, flag) in flags.iter_mut().zip(&parser.flags) {
            if !*seen && flag.regex.is_match(line) {
                *seen = true;
                unresolved -= 1;
            }
        }
    }

    let mut metrics = Metrics::new();
    for (value, pattern) in values.into_iter().zip(&parser.patterns) {
        match value {
            Some(v) => {
                metrics.insert(pattern.name.clone(), v);
            }
            None if pattern.required => {
                return Err(ExtractError::MissingRequired {
                    parser_id: parser.id.clone(),
                    metric: pattern.name.clone(),
                });
            }
            None => {}
        }
    }
    for (seen, flag) in flags.into_iter().zip(&parser.flags) {
        metrics.insert(flag.name.clone(), MetricValue::Int(i64::from(seen)));
    }

    Ok(metrics)
}

/// Apply several parsers in order and merge their metrics.
///
/// A later parser binding an already-bound name replaces the earlier value.
pub fn extract_all(content: &str, parsers: &[&MetricParser]) -> Result<Metrics, ExtractError> {
    let mut merged = Metrics::new();
    for parser in parsers {
        for (name, value) in extract_metrics(content, parser)? {
            if let Some(previous) = merged.insert(name.clone(), value) {
                tracing::debug!(
                    parser = %parser.id,
                    metric = %name,
                    %previous,
                    %value,
                    "Metric overridden by later parser"
                );
            }
        }
    }
    Ok(merged)
}

/// Convert captured text to the declared kind.
///
/// Surrounding whitespace is ignored; anything else the standard integer or
/// float parser rejects is an error. Floats must be finite: properties are
/// JSON, which has no spelling for `inf` or `nan`.
pub fn convert(raw: &str, kind: ValueKind) -> Result<MetricValue, String> {
    let text = raw.trim();
    match kind {
        ValueKind::Int => text
            .parse::<i64>()
            .map(MetricValue::Int)
            .map_err(|e| e.to_string()),
        ValueKind::Float => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(MetricValue::Float(v)),
            Ok(_) => Err("value is not a finite number".to_string()),
            Err(e) => Err(e.to_string()),
        },
    }
}

/// Cap captured text quoted in error messages.
fn preview(raw: &str) -> String {
    if raw.len() <= constants::DEBUG_MAX_LINE_PREVIEW {
        return raw.to_string();
    }
    let mut end = constants::DEBUG_MAX_LINE_PREVIEW;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}

// =============================================================================
// Tests
// =============================================================================
