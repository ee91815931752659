//! End-to-end checks of the compiled `staycast` binary: argument parsing,
//! stage artifacts, and failure exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use staycast_classifiers::io::REQUIRED_COLUMNS;

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

/// A raw export of `n` bookings where long lead times and non-refundable
/// deposits are mostly canceled.
fn write_raw_bookings(path: &Path, n: usize) {
    let mut lines = vec![REQUIRED_COLUMNS.join(",")];
    for i in 0..n {
        let lead_time = (i * 37) % 300;
        let deposit = if i % 7 == 0 { "Non Refund" } else { "No Deposit" };
        let canceled = lead_time > 150 || deposit == "Non Refund" || i % 11 == 0;
        let hotel = if i % 3 == 0 { "Resort Hotel" } else { "City Hotel" };
        let children = if i % 13 == 0 { "NA".to_string() } else { (i % 2).to_string() };
        let agent = if i % 5 == 0 { "NULL".to_string() } else { format!("{}", 9 + i % 4) };
        let row = [
            hotel.to_string(),
            (canceled as u8).to_string(),
            lead_time.to_string(),
            "2016".to_string(),
            MONTHS[i % 12].to_string(),
            (1 + i % 52).to_string(),
            (1 + i % 28).to_string(),
            (i % 3).to_string(),
            (1 + i % 4).to_string(),
            "2".to_string(),
            children,
            "0".to_string(),
            if i % 4 == 0 { "HB" } else { "BB" }.to_string(),
            if i % 2 == 0 { "PRT" } else { "GBR" }.to_string(),
            "Online TA".to_string(),
            "TA/TO".to_string(),
            ((i % 17 == 0) as u8).to_string(),
            ((i % 9 == 0) as u8).to_string(),
            "0".to_string(),
            "A".to_string(),
            "A".to_string(),
            (i % 2).to_string(),
            deposit.to_string(),
            agent,
            "NULL".to_string(),
            "0".to_string(),
            "Transient".to_string(),
            format!("{:.2}", 60.0 + (i % 50) as f64 * 2.5),
            "0".to_string(),
            (i % 3).to_string(),
            if canceled { "Canceled" } else { "Check-Out" }.to_string(),
            "2016-06-01".to_string(),
        ];
        lines.push(row.join(","));
    }
    fs::write(path, lines.join("\n")).unwrap();
}

fn cmd() -> Command {
    Command::cargo_bin("staycast").unwrap()
}

fn write_small_config(path: &Path) {
    let config = r#"{
        "cv": { "folds": 3, "repeats": 1, "seed": 5 },
        "recipe": { "collapse": { "count": 20 } },
        "searches": [
            { "kind": "explicit", "family": "knn",
              "configs": [ { "family": "knn", "neighbors": 7, "weighting": "uniform" } ] },
            { "kind": "grid", "family": "random_forest",
              "params": { "trees": [15], "max_depth": [4, 6] } }
        ],
        "explain": { "n_repeats": 2, "max_reference": 20, "n_explain": 5 }
    }"#;
    fs::write(path, config).unwrap();
}

// ---------------------------------------------------------------------------
// Argument handling
// ---------------------------------------------------------------------------

#[test]
fn test_no_args_shows_help() {
    cmd().assert().failure().stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_stages() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare").and(predicate::str::contains("explain")));
}

#[test]
fn test_missing_input_fails() {
    let dir = tempdir().unwrap();
    cmd()
        .args(["clean", "does_not_exist.csv", "-o"])
        .arg(dir.path().join("cleaned.csv"))
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[test]
fn test_clean_prints_default_config() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("hotel_bookings.csv");
    let cleaned = dir.path().join("cleaned.csv");
    write_raw_bookings(&raw, 60);

    cmd()
        .arg("clean")
        .arg(&raw)
        .arg("-o")
        .arg(&cleaned)
        .assert()
        .success()
        .stderr(predicate::str::contains("No config provided"));

    let header = fs::read_to_string(&cleaned).unwrap();
    let first_line = header.lines().next().unwrap();
    assert!(first_line.ends_with("canceled"));
    assert!(!first_line.contains("reservation_status"));
}

#[test]
fn test_stage_by_stage() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("hotel_bookings.csv");
    let config = dir.path().join("config.json");
    let cleaned = dir.path().join("cleaned.csv");
    let prepared = dir.path().join("prepared.json");
    let model = dir.path().join("model_knn.json");
    write_raw_bookings(&raw, 150);
    write_small_config(&config);

    cmd().arg("clean").arg(&raw).arg(&config).arg("-o").arg(&cleaned).assert().success();
    cmd()
        .arg("prepare")
        .arg(&cleaned)
        .arg(&config)
        .args(["-o"])
        .arg(&prepared)
        .args(["--folds", "2"])
        .assert()
        .success();
    cmd()
        .arg("tune")
        .arg(&prepared)
        .args(["--family", "knn", "-o"])
        .arg(&model)
        .assert()
        .success();
    assert!(dir.path().join("model_knn_test_predictions.csv").exists());
    assert!(dir.path().join("model_knn_train_predictions.csv").exists());

    cmd()
        .arg("compare")
        .arg(&model)
        .arg("-o")
        .arg(dir.path().join("comparison.csv"))
        .arg("--html")
        .arg(dir.path().join("report.html"))
        .assert()
        .success();
    let html = fs::read_to_string(dir.path().join("report.html")).unwrap();
    assert!(html.contains("<table>"));

    cmd()
        .arg("explain")
        .arg(&prepared)
        .arg(&model)
        .arg("-o")
        .arg(dir.path().join("explanation.json"))
        .assert()
        .success();
    let explanation = fs::read_to_string(dir.path().join("explanation.json")).unwrap();
    assert!(explanation.contains("\"importance\""));
}

#[test]
fn test_unknown_family_is_rejected() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("hotel_bookings.csv");
    let cleaned = dir.path().join("cleaned.csv");
    let prepared = dir.path().join("prepared.json");
    write_raw_bookings(&raw, 60);

    cmd().arg("clean").arg(&raw).arg("-o").arg(&cleaned).assert().success();
    cmd().arg("prepare").arg(&cleaned).arg("-o").arg(&prepared).assert().success();
    cmd()
        .arg("tune")
        .arg(&prepared)
        .args(["--family", "svm"])
        .env("STAYCAST_LOG", "error")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown model family"));
}

#[test]
fn test_run_writes_all_artifacts() {
    let dir = tempdir().unwrap();
    let raw = dir.path().join("hotel_bookings.csv");
    let config = dir.path().join("config.json");
    let out = dir.path().join("out");
    write_raw_bookings(&raw, 150);
    write_small_config(&config);

    cmd()
        .arg("run")
        .arg(&raw)
        .arg(&config)
        .arg("--out-dir")
        .arg(&out)
        .assert()
        .success();

    for name in [
        "cleaned.csv",
        "prepared.json",
        "model_knn.json",
        "model_random_forest.json",
        "comparison.csv",
        "report.html",
    ] {
        assert!(out.join(name).exists(), "missing {}", name);
    }
    // the tuned forest is explained, whichever model scores best on the test split
    let explanation: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join("explanation_random_forest.json")).unwrap()).unwrap();
    assert_eq!(explanation["family"], "random_forest");
    assert!(!explanation["shapley"]["explanations"].as_array().unwrap().is_empty());

    let comparison = fs::read_to_string(out.join("comparison.csv")).unwrap();
    assert_eq!(comparison.lines().count(), 3);
}
