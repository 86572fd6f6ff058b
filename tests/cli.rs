//! Integration tests for the `astrid-rs` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CSV: &str = "COU,SECT,YEA,CLASS,STRI\n\
    FRA,ALLSEC,2023,STRI,0.21\n\
    FRA,ALLSEC,2024,STRI,0.20\n\
    DEU,TC,2024,STRI,0.18\n";

fn astrid() -> Command {
    let mut cmd = Command::cargo_bin("astrid-rs").unwrap_or_else(|_| unreachable!());
    cmd.env_remove("ASTRID_DATA")
        .env_remove("ASTRID_REFORMS")
        .env_remove("ASTRID_PROMPT_DIR")
        .env_remove("ASTRID_LOG");
    cmd
}

fn data_dir() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let path = dir.path().join("stri.csv");
    std::fs::write(&path, CSV).unwrap_or_else(|_| unreachable!());
    (dir, path)
}

#[test]
fn help_lists_commands() {
    astrid()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("init-prompts"));
}

#[test]
fn inspect_reports_overview() {
    let (_dir, path) = data_dir();
    astrid()
        .arg("--data")
        .arg(&path)
        .arg("inspect")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rows:          3"))
        .stdout(predicate::str::contains("DEU, FRA"))
        .stdout(predicate::str::contains("2023-2024"));
}

#[test]
fn inspect_json() {
    let (_dir, path) = data_dir();
    let output = astrid()
        .args(["--format", "json", "inspect", "--data"])
        .arg(&path)
        .output()
        .unwrap_or_else(|_| unreachable!());
    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).unwrap_or_else(|_| unreachable!());
    assert_eq!(value["rows"], 3);
    assert_eq!(value["years"], serde_json::json!([2023, 2024]));
}

#[test]
fn inspect_missing_table_fails() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    astrid()
        .arg("--data")
        .arg(dir.path().join("absent.csv"))
        .arg("inspect")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

#[test]
fn inspect_rejects_bad_fraction() {
    let (_dir, path) = data_dir();
    astrid()
        .arg("--data")
        .arg(&path)
        .args(["--sample-fraction", "0", "inspect"])
        .assert()
        .failure();
}

#[test]
fn init_prompts_scaffolds_once() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    astrid()
        .args(["init-prompts", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("gate.md"));
    assert!(dir.path().join("fusion.md").exists());

    astrid()
        .args(["init-prompts", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("already exist"));
}

#[test]
fn feedback_is_appended() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let log = dir.path().join("ratings.jsonl");
    astrid()
        .args(["feedback", "What is STRI?", "An index.", "4", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Feedback recorded"));

    let text = std::fs::read_to_string(&log).unwrap_or_else(|_| unreachable!());
    let record: serde_json::Value =
        serde_json::from_str(text.trim()).unwrap_or_else(|_| unreachable!());
    assert_eq!(record["score"], 4);
    assert_eq!(record["query"], "What is STRI?");
}

#[test]
fn feedback_rejects_out_of_range_score() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let log = dir.path().join("ratings.jsonl");
    astrid()
        .args(["feedback", "q", "a", "7", "--log"])
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 1 and 5"));
    assert!(!log.exists());
}

#[test]
fn ask_without_api_key_fails() {
    let (_dir, path) = data_dir();
    astrid()
        .env_remove("OPENAI_API_KEY")
        .env_remove("ASTRID_API_KEY")
        .arg("--data")
        .arg(&path)
        .args(["ask", "What is STRI?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key missing"));
}
