// PlateauLab - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. Configuration and logging initialisation
// 3. Metric parser loading (built-in + user-defined)
// 4. Dispatch to the build, parse, fetch and report steps

use plateaulab::app::{build_step, fetch_step, parse_step, parser_mgr};
use plateaulab::core::discovery::DiscoveryConfig;
use plateaulab::core::experiment::Experiment;
use plateaulab::core::export::{self, ReportFormat};
use plateaulab::core::model::{default_attributes, MetricParser};
use plateaulab::core::{extract, report};
use plateaulab::platform::config::{self as app_config, AppConfig, PlatformPaths};
use plateaulab::platform::{env::ProcessEnv, fs};
use plateaulab::util::constants;
use plateaulab::util::error::{self, ExportError, PlateauLabError};

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

/// PlateauLab - tie-breaking experiments for classical planners.
///
/// Define experiments in TOML, lay them out for the runner, extract metrics
/// from the planner logs and compare configurations in per-domain reports.
#[derive(Parser, Debug)]
#[command(name = "plateaulab", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Additional directory containing user-defined metric parsers.
    #[arg(short = 'p', long = "parser-dir", global = true)]
    parser_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lay out one directory per run for the external runner.
    Build {
        /// Experiment definition file.
        experiment: PathBuf,
        /// Experiment directory to create.
        exp_dir: PathBuf,
        /// Replace an existing experiment directory.
        #[arg(long)]
        overwrite: bool,
    },

    /// Extract metrics from every run log into the run's properties.
    Parse {
        exp_dir: PathBuf,
        /// Experiment definition supplying the parser list.
        #[arg(short = 'e', long)]
        experiment: Option<PathBuf>,
        /// Parser id to apply (repeatable; overrides the experiment's list).
        #[arg(long = "parser")]
        parsers: Vec<String>,
    },

    /// Collect run properties into the evaluation dataset.
    Fetch { exp_dir: PathBuf },

    /// Render per-domain comparison tables from the fetched dataset.
    Report {
        exp_dir: PathBuf,
        /// Experiment definition supplying attributes and column order.
        #[arg(short = 'e', long)]
        experiment: Option<PathBuf>,
        /// Output format.
        #[arg(short = 'f', long, value_enum, default_value_t)]
        format: ReportFormat,
        /// Write to this file instead of stdout.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Apply parsers to a single log file and print the metrics as JSON.
    Extract {
        log_file: PathBuf,
        /// Parser id to apply (repeatable; default: all).
        #[arg(long = "parser")]
        parsers: Vec<String>,
    },

    /// List the loaded metric parsers.
    Parsers,
}

fn main() {
    let cli = Cli::parse();

    let platform_paths = PlatformPaths::resolve();
    let (config, config_warnings) = app_config::load_config(&platform_paths.config_dir);

    plateaulab::util::logging::init(
        cli.debug,
        config.log_level.as_deref(),
        config.log_file.as_deref(),
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "PlateauLab starting"
    );

    // Parser directory: CLI override > config > platform default
    let user_parser_dir = cli
        .parser_dir
        .clone()
        .or_else(|| config.user_parser_dir.clone())
        .unwrap_or_else(|| platform_paths.user_parsers_dir.clone());
    let (parsers, parser_errors) = parser_mgr::load_all_parsers(Some(&user_parser_dir));
    for err in &parser_errors {
        eprintln!("warning: {err}");
    }

    if let Err(e) = run(cli.command, &config, &parsers) {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(
    command: Command,
    config: &AppConfig,
    parsers: &[MetricParser],
) -> error::Result<()> {
    let parser_ids: Vec<&str> = parsers.iter().map(|p| p.id.as_str()).collect();
    let discovery = DiscoveryConfig {
        max_depth: config.max_depth,
        max_runs: config.max_runs,
        large_log_threshold: config.large_log_threshold,
    };

    match command {
        Command::Build {
            experiment,
            exp_dir,
            overwrite,
        } => {
            let exp = build_step::load_experiment_file(&experiment, &parser_ids)?;
            let summary = build_step::build_from_env(&exp, &exp_dir, &ProcessEnv, overwrite)?;
            println!(
                "Built '{}': {} runs in {} blocks under {}",
                exp.name,
                summary.runs,
                summary.blocks,
                summary.exp_dir.display()
            );
        }

        Command::Parse {
            exp_dir,
            experiment,
            parsers: ids,
        } => {
            let ids = if ids.is_empty() {
                match experiment {
                    Some(path) => build_step::load_experiment_file(&path, &parser_ids)?.parsers,
                    None => Vec::new(),
                }
            } else {
                ids
            };
            let selected = parser_mgr::select_parsers(parsers, &ids)?;
            let options = parse_step::ParseOptions {
                discovery,
                worker_threads: config.worker_threads,
            };
            let summary = parse_step::parse_experiment(&exp_dir, &selected, &options)?;

            for outcome in summary.failed() {
                println!(
                    "FAILED {}: {}",
                    outcome.dir.display(),
                    outcome.error.as_deref().unwrap_or_default()
                );
            }
            println!(
                "Parsed {} runs ({} failed, {} pending) in {:.2}s",
                summary.outcomes.len(),
                summary.failed().count(),
                summary.pending,
                summary.duration.as_secs_f64()
            );
            summary.check()?;
        }

        Command::Fetch { exp_dir } => {
            let summary = fetch_step::fetch_experiment(&exp_dir, &discovery)?;
            println!(
                "Fetched {} runs into {}",
                summary.runs,
                summary.dataset_path.display()
            );
            if summary.unparsed > 0 {
                println!("{} runs have not been parsed yet", summary.unparsed);
            }
        }

        Command::Report {
            exp_dir,
            experiment,
            format,
            output,
        } => {
            let dataset = fetch_step::load_dataset(&fetch_step::dataset_path(&exp_dir))?;
            let exp: Option<Experiment> = experiment
                .map(|path| build_step::load_experiment_file(&path, &parser_ids))
                .transpose()?;
            let (attributes, algorithms) = match &exp {
                Some(e) => (e.attributes.clone(), e.algorithms()),
                None => (default_attributes(), Vec::new()),
            };

            let built = report::build_report(&dataset, &attributes, &algorithms)?;
            write_report(&built, format, output.as_deref())?;
        }

        Command::Extract {
            log_file,
            parsers: ids,
        } => {
            let selected = parser_mgr::select_parsers(parsers, &ids)?;
            let size = std::fs::metadata(&log_file)
                .map_err(|e| io_error(&log_file, "stat log file", e))?
                .len();
            let content = fs::read_log(&log_file, size >= config.large_log_threshold)
                .map_err(|e| io_error(&log_file, "read log file", e))?;
            let metrics = extract::extract_all(&content, &selected)?;
            let json = serde_json::to_string_pretty(&metrics).map_err(|e| ExportError::Json {
                path: log_file.clone(),
                source: e,
            })?;
            println!("{json}");
        }

        Command::Parsers => {
            for parser in parsers {
                let origin = if parser.is_builtin { "built-in" } else { "user" };
                println!("{} ({}, {origin})", parser.id, parser.name);
                if !parser.description.is_empty() {
                    println!("    {}", parser.description);
                }
                println!("    metrics: {}", parser.metric_names().join(", "));
            }
        }
    }

    Ok(())
}

fn write_report(
    built: &report::Report,
    format: ReportFormat,
    output: Option<&Path>,
) -> error::Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| ExportError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            let mut writer = std::io::BufWriter::new(file);
            let rows = export::export_report(built, format, &mut writer, path)?;
            writer.flush().map_err(|e| ExportError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            println!("Wrote {rows} rows to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            export::export_report(built, format, stdout.lock(), Path::new("<stdout>"))?;
        }
    }
    Ok(())
}

fn io_error(path: &Path, operation: &'static str, source: std::io::Error) -> PlateauLabError {
    PlateauLabError::Io {
        path: path.to_path_buf(),
        operation,
        source,
    }
}
