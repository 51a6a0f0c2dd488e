//! Integration tests for the regmap CLI.

use log as _;
use regmap_core as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

const SCHEMA: &str = r#"{
    "name": "demo",
    "registers": [
        {
            "name": "CTRL",
            "address": 0,
            "default_value": 1,
            "elements": [
                {"name": "enable", "idx_lowest_bit": 0, "n_bits": 1},
                {"name": "mode", "idx_lowest_bit": 1, "n_bits": 3},
                {"name": "id", "idx_lowest_bit": 4, "n_bits": 4, "value": 9, "read_only": true}
            ]
        },
        {
            "name": "GAIN",
            "address": 2,
            "elements": [
                {"name": "gain", "idx_lowest_bit": 0, "n_bits": 16}
            ]
        }
    ]
}"#;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("regmap")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Value column of the rendered `[ name ]` line, padding stripped.
fn element_line<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let label = format!("[ {name} ]");
    text.lines()
        .find_map(|line| line.strip_prefix(label.as_str()))
        .map(str::trim_start)
}

#[test]
fn show_prints_loaded_values() {
    let temp_dir = tempfile::tempdir().unwrap();
    let schema = create_temp_file(temp_dir.path(), "demo.json", SCHEMA);
    let values = create_temp_file(temp_dir.path(), "cap.txt", "0, 95h\n2, 0x1234\n");

    let output = Command::new(binary_path())
        .args([
            "show",
            schema.to_str().unwrap(),
            "--values",
            values.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("demo\n"));
    assert!(stdout.contains("<< CTRL >>"));
    assert_eq!(element_line(&stdout, "mode"), Some(":  2"));
    assert_eq!(element_line(&stdout, "gain"), Some(":  4660"));
}

#[test]
fn dump_writes_text_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let schema = create_temp_file(temp_dir.path(), "demo.json", SCHEMA);
    let out = temp_dir.path().join("state.txt");

    let status = Command::new(binary_path())
        .args([
            "dump",
            schema.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .status()
        .expect("failed to run regmap");

    assert!(status.success());
    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text, "# demo\n0, 90h\n2, 0h\n");
}

#[test]
fn dump_to_stdout_applies_values() {
    let temp_dir = tempfile::tempdir().unwrap();
    let schema = create_temp_file(temp_dir.path(), "demo.json", SCHEMA);
    let values = create_temp_file(temp_dir.path(), "cap.txt", "# capture\n2, 0x00ff\n7, 1h\n");

    let output = Command::new(binary_path())
        .args([
            "dump",
            schema.to_str().unwrap(),
            "--values",
            values.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2, ffh\n"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warn"), "unknown address should be logged: {stderr}");
}

#[test]
fn diff_exits_nonzero_on_differences() {
    let temp_dir = tempfile::tempdir().unwrap();
    let before = create_temp_file(temp_dir.path(), "a.txt", "0, 1h\n2, 5h\n");
    let after = create_temp_file(temp_dir.path(), "b.txt", "0, 1h\n2, 6h\n4, 0h\n");

    let output = Command::new(binary_path())
        .args(["diff", before.to_str().unwrap(), after.to_str().unwrap()])
        .output()
        .expect("failed to run regmap");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 of 3 addresses differ"));
    assert!(stdout.contains("0x6"));
}

#[test]
fn diff_of_identical_dumps_succeeds() {
    let temp_dir = tempfile::tempdir().unwrap();
    let before = create_temp_file(temp_dir.path(), "a.txt", "0, 1h\n");
    let after = create_temp_file(temp_dir.path(), "b.txt", "# same\n0, 0x1\n");

    let status = Command::new(binary_path())
        .args(["diff", before.to_str().unwrap(), after.to_str().unwrap()])
        .status()
        .expect("failed to run regmap");

    assert!(status.success());
}

#[test]
fn encode_prints_q9_23_bytes() {
    let output = Command::new(binary_path())
        .args(["encode", "3.5"])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0x1c00000"));
    assert!(stdout.contains("01 C0 00 00"));
}

#[test]
fn encode_accepts_negative_value_before_format_flag() {
    let output = Command::new(binary_path())
        .args(["encode", "--", "-1.5", "-f", "q9.23"])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0xff400000"));
    assert!(stdout.contains("FF 40 00 00"));
}

#[test]
fn decode_of_widest_positive_word_keeps_its_sign() {
    let output = Command::new(binary_path())
        .args(["decode", "0x7fffffffffffffff", "-f", "int64"])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("-9"), "sign flipped: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("warn"), "rounding should be logged: {stderr}");
}

#[test]
fn encode_rejects_out_of_range_values() {
    let output = Command::new(binary_path())
        .args(["encode", "128", "-f", "int8"])
        .output()
        .expect("failed to run regmap");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}

#[test]
fn decode_handles_negative_words() {
    let output = Command::new(binary_path())
        .args(["decode", "ffh", "--format", "int8"])
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim_end().ends_with("-1"));
}

#[test]
fn missing_schema_reports_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("nope.json");

    let output = Command::new(binary_path())
        .args(["show", missing.to_str().unwrap()])
        .output()
        .expect("failed to run regmap");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"));
}

#[test]
fn help_flag_shows_usage() {
    let output = Command::new(binary_path())
        .arg("--help")
        .output()
        .expect("failed to run regmap");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}
