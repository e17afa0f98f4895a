// PlateauLab - tests/e2e_pipeline.rs
//
// End-to-end tests for the build -> parse -> fetch -> report pipeline.
//
// These run against the real filesystem with the built-in parsers. The
// external runner is simulated by writing a run.log into every run
// directory the build step created.

use plateaulab::app::{build_step, fetch_step, parse_step, parser_mgr};
use plateaulab::core::discovery::DiscoveryConfig;
use plateaulab::core::export::{self, ReportFormat};
use plateaulab::core::experiment;
use plateaulab::core::model::MetricValue;
use plateaulab::core::report;
use plateaulab::util::error::{ConfigError, PlateauLabError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// =============================================================================
// Helpers
// =============================================================================

const EXPERIMENT: &str = r#"
[experiment]
name = "distance-test"
revisions = ["1a415eebfdd9640db81d4458f7bfed8ab1ddd7a5"]
driver_options = ["--overall-time-limit", "5m"]
parsers = ["search", "plateau"]

[suite]
tasks = ["gripper"]

[[config]]
nick = "fifo"
options = ["--search", "eager(tiebreaking([sum([g(), h]), h], tiebreaking_criteria=fifo))"]

[[config]]
nick = "lifo"
options = ["--search", "eager(tiebreaking([sum([g(), h]), h], tiebreaking_criteria=lifo))"]

[[attribute]]
name = "coverage"
min_wins = false
function = "sum"
absolute = true

[[attribute]]
name = "max_depth"
min_wins = false
function = "arithmetic_mean"
"#;

struct Workspace {
    _root: tempfile::TempDir,
    benchmarks: PathBuf,
    repo: PathBuf,
    exp_dir: PathBuf,
}

fn workspace() -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let benchmarks = root.path().join("benchmarks");
    let gripper = benchmarks.join("gripper");
    fs::create_dir_all(&gripper).unwrap();
    for f in ["domain.pddl", "prob01.pddl", "prob02.pddl"] {
        fs::write(gripper.join(f), "(define)").unwrap();
    }
    let repo = root.path().join("downward");
    fs::create_dir_all(&repo).unwrap();
    let exp_dir = root.path().join("distance-test");
    Workspace {
        benchmarks,
        repo,
        exp_dir,
        _root: root,
    }
}

fn env_for(ws: &Workspace) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert(
        "DOWNWARD_BENCHMARKS".to_string(),
        ws.benchmarks.display().to_string(),
    );
    env.insert("DOWNWARD_REPO".to_string(), ws.repo.display().to_string());
    env
}

fn load_experiment() -> experiment::Experiment {
    let known = ["search", "planner", "plateau", "landmark"];
    experiment::load_experiment(EXPERIMENT, Path::new("distance-test.toml"), &known).unwrap()
}

/// Log the planner would print for one run.
fn fake_log(algorithm: &str, problem: &str) -> &'static str {
    match (algorithm, problem) {
        ("fifo", "prob01.pddl") => {
            "Expanded 120 state(s).\nMax plateau depth : 5\nSolution found!\nSearch time: 0.5s\n"
        }
        ("fifo", "prob02.pddl") => {
            "Expanded 80 state(s).\nMax plateau depth : 3\nSolution found!\nSearch time: 0.25s\n"
        }
        ("lifo", "prob01.pddl") => {
            "Expanded 300 state(s).\nMax plateau depth : 2\nSolution found!\nSearch time: 1.5s\n"
        }
        _ => "Max plateau depth : 1\nTime limit reached. Abort search.\n",
    }
}

/// Simulate the runner: write a run.log next to every static-properties file.
fn run_all(exp_dir: &Path) -> usize {
    let mut count = 0;
    for entry in walkdir::WalkDir::new(exp_dir) {
        let entry = entry.unwrap();
        if entry.file_name() != "static-properties" {
            continue;
        }
        let props: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(entry.path()).unwrap()).unwrap();
        let log = fake_log(
            props["algorithm"].as_str().unwrap(),
            props["problem"].as_str().unwrap(),
        );
        fs::write(entry.path().with_file_name("run.log"), log).unwrap();
        count += 1;
    }
    count
}

// =============================================================================
// Pipeline E2E
// =============================================================================

#[test]
fn e2e_build_parse_fetch_report() {
    let ws = workspace();
    let exp = load_experiment();

    let built = build_step::build_from_env(&exp, &ws.exp_dir, &env_for(&ws), false).unwrap();
    assert_eq!(built.runs, 4);
    assert_eq!(built.blocks, 1);
    assert!(ws.exp_dir.join("plan.json").is_file());

    let run_dir = ws.exp_dir.join("runs-00001-00100").join("00001");
    let command = fs::read_to_string(run_dir.join("command")).unwrap();
    assert!(command.contains("--overall-time-limit 5m"), "{command}");
    assert!(command.contains("tiebreaking_criteria=fifo"), "{command}");

    assert_eq!(run_all(&ws.exp_dir), 4);

    let (parsers, errors) = parser_mgr::load_all_parsers(None);
    assert!(errors.is_empty());
    let selected = parser_mgr::select_parsers(&parsers, &exp.parsers).unwrap();
    let summary =
        parse_step::parse_experiment(&ws.exp_dir, &selected, &parse_step::ParseOptions::default())
            .unwrap();
    assert_eq!(summary.outcomes.len(), 4);
    assert!(summary.check().is_ok());

    let fetched = fetch_step::fetch_experiment(&ws.exp_dir, &DiscoveryConfig::default()).unwrap();
    assert_eq!(fetched.runs, 4);
    assert_eq!(fetched.unparsed, 0);

    let dataset = fetch_step::load_dataset(&fetched.dataset_path).unwrap();
    assert_eq!(dataset["fifo-gripper-prob01.pddl"]["expansions"], 120);
    assert_eq!(dataset["lifo-gripper-prob02.pddl"]["coverage"], 0);
    assert!(dataset["lifo-gripper-prob02.pddl"].get("expansions").is_none());

    let built_report = report::build_report(&dataset, &exp.attributes, &exp.algorithms()).unwrap();
    assert_eq!(built_report.algorithms, vec!["fifo", "lifo"]);

    let markdown = export::render_markdown(&built_report);
    assert!(markdown.contains("## coverage"), "{markdown}");
    assert!(markdown.contains("| gripper (2) | **2** | 1 |"), "{markdown}");
    assert!(markdown.contains("| gripper (2) | **4** | 1.50 |"), "{markdown}");

    let mut csv = Vec::new();
    let rows =
        export::export_report(&built_report, ReportFormat::Csv, &mut csv, Path::new("r.csv"))
            .unwrap();
    assert_eq!(rows, 4);
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("attribute,domain,tasks,fifo,lifo"), "{csv}");
}

#[test]
fn e2e_build_refuses_existing_experiment_dir() {
    let ws = workspace();
    let exp = load_experiment();
    let env = env_for(&ws);

    build_step::build_from_env(&exp, &ws.exp_dir, &env, false).unwrap();
    let again = build_step::build_from_env(&exp, &ws.exp_dir, &env, false);
    assert!(again.is_err());

    let rebuilt = build_step::build_from_env(&exp, &ws.exp_dir, &env, true).unwrap();
    assert_eq!(rebuilt.runs, 4);
}

#[test]
fn e2e_missing_environment_writes_nothing() {
    let ws = workspace();
    let exp = load_experiment();
    let mut env = env_for(&ws);
    env.remove("DOWNWARD_REPO");

    let err = build_step::build_from_env(&exp, &ws.exp_dir, &env, false).unwrap_err();
    assert!(matches!(
        err,
        PlateauLabError::Config(ConfigError::MissingEnvVar { .. })
    ));
    assert!(!ws.exp_dir.exists());
}

#[test]
fn e2e_reparse_after_rerun_updates_dataset() {
    let ws = workspace();
    let exp = load_experiment();
    build_step::build_from_env(&exp, &ws.exp_dir, &env_for(&ws), false).unwrap();
    run_all(&ws.exp_dir);

    let (parsers, _) = parser_mgr::load_all_parsers(None);
    let selected = parser_mgr::select_parsers(&parsers, &exp.parsers).unwrap();
    let options = parse_step::ParseOptions::default();
    parse_step::parse_experiment(&ws.exp_dir, &selected, &options).unwrap();

    // Rerun the first run with a deeper plateau.
    let log = ws
        .exp_dir
        .join("runs-00001-00100")
        .join("00001")
        .join("run.log");
    fs::write(&log, "Max plateau depth : 9\nSolution found!\n").unwrap();
    parse_step::parse_experiment(&ws.exp_dir, &selected, &options).unwrap();

    let fetched = fetch_step::fetch_experiment(&ws.exp_dir, &DiscoveryConfig::default()).unwrap();
    let dataset = fetch_step::load_dataset(&fetched.dataset_path).unwrap();
    let first = dataset
        .values()
        .find(|p| p["id"] == 1)
        .expect("run 1 in dataset");
    assert_eq!(first["max_depth"], 9);
    assert!(first.get("expansions").is_none());
}

// =============================================================================
// Shipped experiment definitions
// =============================================================================

fn shipped(name: &str) -> experiment::Experiment {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("experiments")
        .join(name);
    let (parsers, _) = parser_mgr::load_all_parsers(None);
    let ids: Vec<&str> = parsers.iter().map(|p| p.id.as_str()).collect();
    build_step::load_experiment_file(&path, &ids).unwrap()
}

#[test]
fn e2e_shipped_experiments_load() {
    let distance = shipped("distance-test.toml");
    assert_eq!(distance.configs.len(), 9);
    assert_eq!(distance.configs[2].nick, "[f, h^, ro]");
    assert!(distance.configs[2].component_options[1].contains("tiebreaking_criteria=random"));

    let depth = shipped("depth-ipc.toml");
    assert_eq!(depth.configs.len(), 12);
    assert_eq!(depth.benchmarks_env, "DOWNWARD_IPC_BENCHMARKS");
    let ro2 = depth
        .configs
        .iter()
        .find(|c| c.nick == "f, h^-ff, <d>, ro2")
        .expect("second replica");
    assert!(ro2.component_options[1].starts_with("let(h2, lmcut(), let(hff2,"));
    let last = depth.configs.last().expect("tenth replica");
    assert_eq!(last.nick, "f, h^-ff, <d>, ro0");
    assert!(last.component_options[1].starts_with("let(h0, lmcut(), let(hff0,"));
    assert!(!depth.configs.iter().any(|c| c.nick.ends_with("ro10")));

    let ms = shipped("distance-ms.toml");
    assert_eq!(ms.configs.len(), 24);
    assert_eq!(ms.attributes.len(), 4);
    assert_eq!(ms.algorithms()[0], "f, h^, fifo");
}

// =============================================================================
// Extraction from recorded planner logs
// =============================================================================

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn e2e_extracts_solved_run_fixture() {
    let (parsers, _) = parser_mgr::load_all_parsers(None);
    let all = parser_mgr::select_parsers(&parsers, &[]).unwrap();
    let content = plateaulab::platform::fs::read_log(&fixture("solved_run.log"), false).unwrap();

    let metrics = plateaulab::core::extract::extract_all(&content, &all).unwrap();
    let int = |name: &str| match metrics.get(name) {
        Some(MetricValue::Int(v)) => *v,
        other => panic!("{name}: expected int, got {other:?}"),
    };
    let float = |name: &str| match metrics.get(name) {
        Some(MetricValue::Float(v)) => *v,
        other => panic!("{name}: expected float, got {other:?}"),
    };

    assert_eq!(int("max_entries_per_plateau"), 42);
    assert_eq!(int("max_depth"), 7);
    assert_eq!(int("max_leveled_plateaus"), 3);
    assert!(!metrics.contains_key("max_depth_width"));
    assert_eq!(int("landmarks"), 12);
    assert!((float("lmgraph_generation_time") - 0.010).abs() < 1e-9);
    assert_eq!(int("expansions"), 1204);
    assert_eq!(int("evaluations"), 2310);
    assert_eq!(int("generated"), 5321);
    assert_eq!(int("plan_length"), 11);
    assert_eq!(int("cost"), 11);
    assert_eq!(int("coverage"), 1);
    assert!((float("search_time") - 0.027).abs() < 1e-9);
    assert!((float("total_time") - 0.031).abs() < 1e-9);
    assert!((float("planner_time") - 0.21).abs() < 1e-9);
    assert_eq!(int("memory"), 10416);
}

#[test]
fn e2e_malformed_fixture_is_a_parse_error() {
    let (parsers, _) = parser_mgr::load_all_parsers(None);
    let content = plateaulab::platform::fs::read_log(&fixture("malformed_run.log"), true).unwrap();

    let plateau = parser_mgr::select_parsers(&parsers, &["plateau".to_string()]).unwrap();
    let metrics = plateaulab::core::extract::extract_all(&content, &plateau).unwrap();
    assert_eq!(metrics.get("max_entries_per_plateau"), Some(&MetricValue::Int(5)));

    let landmark = parser_mgr::select_parsers(&parsers, &["landmark".to_string()]).unwrap();
    let err = plateaulab::core::extract::extract_all(&content, &landmark).unwrap_err();
    assert!(err.to_string().contains("lmgraph_generation_time"), "{err}");
}
