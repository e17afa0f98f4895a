// PlateauLab - core/report.rs
//
// Aggregation of a fetched dataset into per-attribute tables: one row per
// domain plus a summary row, one column per algorithm.

use crate::core::model::{Aggregation, Attribute, Dataset, RunProperties};
use crate::util::constants;
use crate::util::error::ReportError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A complete report over one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Column order shared by every table.
    pub algorithms: Vec<String>,
    pub tables: Vec<AttributeTable>,
}

/// All rows for one attribute.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeTable {
    pub attribute: Attribute,
    pub rows: Vec<ReportRow>,
    pub summary: ReportRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    /// Domain name, or the summary label.
    pub label: String,

    /// Number of tasks the cells were aggregated over.
    pub tasks: usize,

    /// One cell per algorithm, in `Report::algorithms` order.
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub value: Option<f64>,
    pub best: bool,
}

/// The fields of a dataset record that place it in a table.
struct RunRecord<'a> {
    algorithm: &'a str,
    domain: &'a str,
    problem: &'a str,
    properties: &'a RunProperties,
}

/// Values of one attribute for one task, indexed by algorithm column.
type TaskValues = Vec<Option<f64>>;

/// Build a report.
///
/// `algorithms` fixes the column order; when empty, every algorithm in the
/// dataset is shown in sorted order. Records of algorithms not listed are
/// ignored.
pub fn build_report(
    dataset: &Dataset,
    attributes: &[Attribute],
    algorithms: &[String],
) -> Result<Report, ReportError> {
    if dataset.is_empty() {
        return Err(ReportError::EmptyDataset);
    }
    if attributes.is_empty() {
        return Err(ReportError::NoAttributes);
    }

    let records = dataset
        .iter()
        .map(|(key, props)| index_record(key, props))
        .collect::<Result<Vec<_>, _>>()?;

    let algorithms: Vec<String> = if algorithms.is_empty() {
        records
            .iter()
            .map(|r| r.algorithm)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        let listed: BTreeSet<&str> = algorithms.iter().map(String::as_str).collect();
        let skipped = records
            .iter()
            .filter(|r| !listed.contains(r.algorithm))
            .count();
        if skipped > 0 {
            tracing::warn!(
                runs = skipped,
                "Dataset contains runs of algorithms not selected for the report"
            );
        }
        algorithms.to_vec()
    };

    let tables = attributes
        .iter()
        .map(|attr| build_table(&records, attr, &algorithms))
        .collect();

    tracing::debug!(
        runs = records.len(),
        algorithms = algorithms.len(),
        attributes = attributes.len(),
        "Report built"
    );

    Ok(Report { algorithms, tables })
}

fn index_record<'a>(
    key: &str,
    properties: &'a RunProperties,
) -> Result<RunRecord<'a>, ReportError> {
    let field = move |name: &'static str| {
        properties
            .get(name)
            .and_then(|v| v.as_str())
            .ok_or_else(|| ReportError::MissingRunField {
                key: key.to_string(),
                field: name,
            })
    };
    Ok(RunRecord {
        algorithm: field("algorithm")?,
        domain: field("domain")?,
        problem: field("problem")?,
        properties,
    })
}

fn build_table(
    records: &[RunRecord<'_>],
    attribute: &Attribute,
    algorithms: &[String],
) -> AttributeTable {
    let column: BTreeMap<&str, usize> = algorithms
        .iter()
        .enumerate()
        .map(|(i, a)| (a.as_str(), i))
        .collect();

    // domain -> problem -> per-algorithm values
    let mut domains: BTreeMap<&str, BTreeMap<&str, TaskValues>> = BTreeMap::new();
    for record in records {
        let Some(&col) = column.get(record.algorithm) else {
            continue;
        };
        let values = domains
            .entry(record.domain)
            .or_default()
            .entry(record.problem)
            .or_insert_with(|| vec![None; algorithms.len()]);
        values[col] = record
            .properties
            .get(&attribute.name)
            .and_then(|v| v.as_f64());
    }

    let rows: Vec<ReportRow> = domains
        .iter()
        .map(|(domain, tasks)| {
            let tasks: Vec<&TaskValues> = tasks.values().collect();
            aggregate_row(domain, &tasks, attribute, algorithms.len())
        })
        .collect();

    let summary = if attribute.function == Aggregation::Sum {
        sum_rows(&rows, attribute, algorithms.len())
    } else {
        let all: Vec<&TaskValues> = domains.values().flat_map(|t| t.values()).collect();
        aggregate_row(constants::SUMMARY_ROW_LABEL, &all, attribute, algorithms.len())
    };

    AttributeTable {
        attribute: attribute.clone(),
        rows,
        summary,
    }
}

fn aggregate_row(
    label: &str,
    tasks: &[&TaskValues],
    attribute: &Attribute,
    columns: usize,
) -> ReportRow {
    let considered: Vec<&TaskValues> = if attribute.absolute {
        tasks.to_vec()
    } else {
        tasks
            .iter()
            .copied()
            .filter(|values| values.iter().all(Option::is_some))
            .collect()
    };

    let values: Vec<Option<f64>> = (0..columns)
        .map(|col| {
            let column: Vec<f64> = considered.iter().filter_map(|t| t[col]).collect();
            aggregate(&column, attribute.function)
        })
        .collect();

    ReportRow {
        label: label.to_string(),
        tasks: considered.len(),
        cells: mark_best(&values, attribute.min_wins),
    }
}

/// Summary of a `sum` attribute: the column sums of the domain rows.
fn sum_rows(rows: &[ReportRow], attribute: &Attribute, columns: usize) -> ReportRow {
    let values: Vec<Option<f64>> = (0..columns)
        .map(|col| {
            rows.iter()
                .filter_map(|r| r.cells[col].value)
                .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
        })
        .collect();
    ReportRow {
        label: constants::SUMMARY_ROW_LABEL.to_string(),
        tasks: rows.iter().map(|r| r.tasks).sum(),
        cells: mark_best(&values, attribute.min_wins),
    }
}

/// Apply an aggregation function. `None` for an empty input.
pub fn aggregate(values: &[f64], function: Aggregation) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let result = match function {
        Aggregation::Sum => values.iter().sum::<f64>(),
        Aggregation::ArithmeticMean => values.iter().sum::<f64>() / n,
        Aggregation::GeometricMean => {
            let log_sum: f64 = values
                .iter()
                .map(|v| v.max(constants::GEOMETRIC_MEAN_FLOOR).ln())
                .sum();
            (log_sum / n).exp()
        }
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Some(result)
}

/// Mark every cell holding the best value; ties are all marked.
fn mark_best(values: &[Option<f64>], min_wins: bool) -> Vec<Cell> {
    let present = values.iter().flatten().copied().filter(|v| !v.is_nan());
    let best = if min_wins {
        present.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
    } else {
        present.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    };
    values
        .iter()
        .map(|&value| Cell {
            value,
            best: matches!((value, best), (Some(v), Some(b)) if v == b),
        })
        .collect()
}
