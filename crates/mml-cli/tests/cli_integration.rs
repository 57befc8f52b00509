//! Integration tests for the mml CLI.
//!
//! Run with: `cargo test --package mml-cli --test cli_integration`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

/// Helper to run mml in `dir` with an isolated config file.
fn run_mml_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mml"))
        .current_dir(dir)
        .env("MML_CONFIG", dir.join("config.json"))
        .env_remove("MML_SEED")
        .env_remove("MML_MAX_PARENTS")
        .env_remove("MML_TEMPERATURE")
        .env_remove("MML_SAMPLING_STEPS")
        .env_remove("MML_BURN_IN_STEPS")
        .args(args)
        .output()
        .expect("Failed to execute mml command")
}

/// Copy `value` with probability 0.9, flip it otherwise.
fn noisy(rng: &mut StdRng, value: &'static str) -> &'static str {
    match (rng.random_bool(0.9), value) {
        (true, _) => value,
        (false, "yes") => "no",
        (false, _) => "yes",
    }
}

/// Write a three-variable chain `rain -> wet -> slippery` with some noise.
fn write_chain_csv(dir: &Path) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(0x2545_f491);
    let mut text = String::from("rain,wet,slippery\n");
    for _ in 0..300 {
        let rain = if rng.random_bool(0.5) { "yes" } else { "no" };
        let wet = noisy(&mut rng, rain);
        let slippery = noisy(&mut rng, wet);
        text.push_str(&format!("{rain},{wet},{slippery}\n"));
    }

    let path = dir.join("chain.csv");
    fs::write(&path, text).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = run_mml_in_dir(dir.path(), &["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("run"));
    assert!(text.contains("inspect"));
    assert!(text.contains("config"));
}

#[test]
fn test_inspect_lists_variables() {
    let dir = TempDir::new().unwrap();
    let csv = write_chain_csv(dir.path());

    let output = run_mml_in_dir(dir.path(), &["inspect", csv.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Rows:      300"));
    assert!(text.contains("Variables: 3"));
    for name in ["rain", "wet", "slippery"] {
        assert!(text.contains(name), "missing {name} in:\n{text}");
    }
    assert!(text.contains("2 states"));
}

#[test]
fn test_run_text_report() {
    let dir = TempDir::new().unwrap();
    let csv = write_chain_csv(dir.path());

    let output = run_mml_in_dir(
        dir.path(),
        &[
            "run",
            csv.to_str().unwrap(),
            "--steps",
            "300",
            "--burn-in",
            "100",
            "--seed",
            "7",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("Best cost:"));
    assert!(text.contains("Best network:"));
    assert!(text.contains("order:"));
    assert!(text.contains("Moves:"));
    assert!(text.contains("single_arc"));
}

#[test]
fn test_run_json_report_to_file() {
    let dir = TempDir::new().unwrap();
    let csv = write_chain_csv(dir.path());
    let report = dir.path().join("report.json");

    let output = run_mml_in_dir(
        dir.path(),
        &[
            "run",
            csv.to_str().unwrap(),
            "--steps",
            "300",
            "--burn-in",
            "100",
            "--format",
            "json",
            "--output",
            report.to_str().unwrap(),
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap())
        .expect("report should be valid JSON");
    assert_eq!(json["sampling_steps"], 300);
    assert_eq!(json["burn_in_steps"], 100);
    assert!(json["best_cost"].as_f64().unwrap() <= json["initial_cost"].as_f64().unwrap());
    assert_eq!(json["best_network"]["variables"].as_array().unwrap().len(), 3);
    assert_eq!(json["best_network"]["dynamic"], false);
    assert!(json["arc_probabilities"]["intraslice"].is_array());
    assert!(json["moves"].as_array().is_some_and(|m| !m.is_empty()));
}

#[test]
fn test_run_dynamic_network() {
    let dir = TempDir::new().unwrap();
    let csv = write_chain_csv(dir.path());

    let output = run_mml_in_dir(
        dir.path(),
        &[
            "run",
            csv.to_str().unwrap(),
            "--dbn",
            "--steps",
            "300",
            "--burn-in",
            "50",
            "--prior",
            "uniform",
            "--format",
            "json",
        ],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["best_network"]["dynamic"], true);
    assert!(json["arc_probabilities"]["temporal"].is_array());
    let kinds: Vec<&str> = json["moves"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"temporal_arc"), "kinds: {kinds:?}");
}

#[test]
fn test_run_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_mml_in_dir(dir.path(), &["run", "does-not-exist.csv"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("does-not-exist.csv"));
}

#[test]
fn test_run_ragged_csv_fails() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("bad.csv");
    fs::write(&csv, "a,b\n0,1\n1\n").unwrap();

    let output = run_mml_in_dir(dir.path(), &["run", csv.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("expected 2 cells"));
}

#[test]
fn test_inspect_reads_quoted_cells() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("quoted.csv");
    fs::write(&csv, "site,reading\n\"Oslo, NO\",high\n\"Bergen, NO\",low\n").unwrap();

    let output = run_mml_in_dir(dir.path(), &["inspect", csv.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let text = stdout(&output);
    assert!(text.contains("Rows:      2"));
    assert!(text.contains("Variables: 2"));
}

#[test]
fn test_run_rejects_invalid_arc_probability() {
    let dir = TempDir::new().unwrap();
    let csv = write_chain_csv(dir.path());

    let output = run_mml_in_dir(
        dir.path(),
        &["run", csv.to_str().unwrap(), "--arc-prob", "1.5"],
    );
    assert!(!output.status.success());
    assert!(stderr(&output).contains("arc_prob"));
}

#[test]
fn test_config_save_and_show() {
    let dir = TempDir::new().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mml"))
        .current_dir(dir.path())
        .env("MML_CONFIG", dir.path().join("config.json"))
        .env("MML_SEED", "42")
        .args(["config", "save"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let saved: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap())
            .unwrap();
    assert_eq!(saved["search"]["seed"], 42);

    let output = run_mml_in_dir(dir.path(), &["config", "show"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("\"seed\": 42"));

    let output = run_mml_in_dir(dir.path(), &["config", "path"]);
    assert!(stdout(&output).contains("config.json"));
}
