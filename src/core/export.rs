// PlateauLab - core/export.rs
//
// Markdown, CSV and JSON rendering of reports.
// Core layer: writes to any Write trait object.

use crate::core::report::{Cell, Report, ReportRow};
use crate::util::constants;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Output format of the `report` command.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    #[value(name = "md", alias = "markdown")]
    Markdown,
    Csv,
    Json,
}

/// Write a report in the given format. Returns the number of rows written.
pub fn export_report<W: Write>(
    report: &Report,
    format: ReportFormat,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    match format {
        ReportFormat::Markdown => export_markdown(report, writer, export_path),
        ReportFormat::Csv => export_csv(report, writer, export_path),
        ReportFormat::Json => export_json(report, writer, export_path),
    }
}

/// Render a cell value: integral values without decimals.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.prec$}", prec = constants::REPORT_DECIMALS)
    }
}

fn all_rows(report: &Report) -> impl Iterator<Item = (&str, &ReportRow)> {
    report.tables.iter().flat_map(|t| {
        t.rows
            .iter()
            .chain(std::iter::once(&t.summary))
            .map(move |row| (t.attribute.name.as_str(), row))
    })
}

/// Render the report as Markdown, one table per attribute. Best cells are bold.
pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();
    for table in &report.tables {
        let attr = &table.attribute;
        out.push_str(&format!(
            "## {}\n\n{} over {}, {} is better\n\n",
            attr.name,
            attr.function.label(),
            if attr.absolute { "all tasks" } else { "common tasks" },
            if attr.min_wins { "lower" } else { "higher" },
        ));

        out.push_str("| Domain |");
        for alg in &report.algorithms {
            out.push_str(&format!(" {} |", alg.replace('|', "\\|")));
        }
        out.push_str("\n|---|");
        for _ in &report.algorithms {
            out.push_str("---:|");
        }
        out.push('\n');

        for row in table.rows.iter().chain(std::iter::once(&table.summary)) {
            out.push_str(&format!("| {} ({}) |", row.label, row.tasks));
            for cell in &row.cells {
                out.push_str(&format!(" {} |", markdown_cell(cell)));
            }
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn markdown_cell(cell: &Cell) -> String {
    match cell.value {
        Some(v) if cell.best => format!("**{}**", format_value(v)),
        Some(v) => format_value(v),
        None => "-".to_string(),
    }
}

/// Export the report as Markdown.
pub fn export_markdown<W: Write>(
    report: &Report,
    mut writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let io_err = |e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    };
    writer
        .write_all(render_markdown(report).as_bytes())
        .map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    Ok(all_rows(report).count())
}

/// Export the report as CSV.
///
/// Writes: attribute, domain, tasks, then one column per algorithm. Empty
/// cells are empty strings; the summary row uses the summary label as domain.
pub fn export_csv<W: Write>(
    report: &Report,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let csv_err = |e| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };

    let mut header = vec!["attribute".to_string(), "domain".to_string(), "tasks".to_string()];
    header.extend(report.algorithms.iter().cloned());
    csv_writer.write_record(&header).map_err(csv_err)?;

    let mut count = 0;
    for (attribute, row) in all_rows(report) {
        let mut record = vec![
            attribute.to_string(),
            row.label.clone(),
            row.tasks.to_string(),
        ];
        record.extend(
            row.cells
                .iter()
                .map(|c| c.value.map(format_value).unwrap_or_default()),
        );
        csv_writer.write_record(&record).map_err(csv_err)?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}

/// Export the report as pretty-printed JSON.
pub fn export_json<W: Write>(
    report: &Report,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    serde_json::to_writer_pretty(writer, report).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(all_rows(report).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Aggregation, Attribute};
    use crate::core::report::AttributeTable;
    use std::path::PathBuf;

    fn row(label: &str, tasks: usize, cells: &[(Option<f64>, bool)]) -> ReportRow {
        ReportRow {
            label: label.to_string(),
            tasks,
            cells: cells
                .iter()
                .map(|&(value, best)| Cell { value, best })
                .collect(),
        }
    }

    fn sample_report() -> Report {
        Report {
            algorithms: vec!["fifo".to_string(), "lifo".to_string()],
            tables: vec![AttributeTable {
                attribute: Attribute::new("max_depth", false, Aggregation::ArithmeticMean, false),
                rows: vec![
                    row("depot", 2, &[(Some(3.5), false), (Some(4.0), true)]),
                    row("gripper", 0, &[(None, false), (None, false)]),
                ],
                summary: row("Summary", 2, &[(Some(3.5), false), (Some(4.0), true)]),
            }],
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(1.23456), "1.23");
        assert_eq!(format_value(-1.0), "-1");
    }

    #[test]
    fn test_markdown_marks_best_and_empty_cells() {
        let md = render_markdown(&sample_report());
        assert!(md.contains("## max_depth"));
        assert!(md.contains("| Domain | fifo | lifo |"));
        assert!(md.contains("| depot (2) | 3.50 | **4** |"));
        assert!(md.contains("| gripper (0) | - | - |"));
        assert!(md.contains("| Summary (2) |"));
    }

    #[test]
    fn test_csv_export() {
        let mut buf = Vec::new();
        let count = export_csv(&sample_report(), &mut buf, &PathBuf::from("out.csv")).unwrap();
        assert_eq!(count, 3);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "attribute,domain,tasks,fifo,lifo");
        assert_eq!(lines[1], "max_depth,depot,2,3.50,4");
        assert_eq!(lines[2], "max_depth,gripper,0,,");
    }

    #[test]
    fn test_json_export() {
        let mut buf = Vec::new();
        let count = export_json(&sample_report(), &mut buf, &PathBuf::from("out.json")).unwrap();
        assert_eq!(count, 3);

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["algorithms"][1], "lifo");
        assert_eq!(value["tables"][0]["rows"][0]["cells"][1]["best"], true);
        assert!(value["tables"][0]["rows"][1]["cells"][0]["value"].is_null());
    }

    #[derive(clap::Parser, Debug)]
    struct FormatArgs {
        #[arg(short = 'f', long, value_enum, default_value_t)]
        format: ReportFormat,
    }

    #[test]
    fn test_report_format_values() {
        use clap::{CommandFactory, Parser, ValueEnum};

        let names: Vec<String> = ReportFormat::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["md", "csv", "json"]);

        assert_eq!(
            ReportFormat::from_str("markdown", false).unwrap(),
            ReportFormat::Markdown
        );
        assert_eq!(ReportFormat::from_str("CSV", true).unwrap(), ReportFormat::Csv);

        let args = FormatArgs::try_parse_from(["report"]).unwrap();
        assert_eq!(args.format, ReportFormat::Markdown);
        let args = FormatArgs::try_parse_from(["report", "-f", "json"]).unwrap();
        assert_eq!(args.format, ReportFormat::Json);
        assert!(FormatArgs::try_parse_from(["report", "-f", "xml"]).is_err());

        let help = FormatArgs::command().render_help().to_string();
        assert!(help.contains("md"));
        assert!(help.contains("csv"));
        assert!(help.contains("json"));
    }
}
