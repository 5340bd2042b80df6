// e2e/cli_integration.rs — CLI integration tests.
//
// Tests the `xgrep` and `xprep` binaries as black-box CLI tools using
// std::process::Command. Covers argument parsing, exit codes, and the
// preprocess-then-search round trip through the metafile.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn bin(name: &str) -> PathBuf {
    if let Ok(p) = std::env::var(format!("CARGO_BIN_EXE_{name}")) {
        return PathBuf::from(p);
    }
    let mut p = std::env::current_exe().unwrap();
    p.pop();
    if p.ends_with("deps") {
        p.pop();
    }
    p.push(name);
    p
}

fn xgrep() -> PathBuf {
    bin("xgrep")
}

fn xprep() -> PathBuf {
    bin("xprep")
}

fn make_temp_input(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("input.txt");
    let mut content = String::new();
    for i in 0..200 {
        if i % 10 == 0 {
            content.push_str("the quick brown fox jumps over the lazy dog\n");
        } else {
            content.push_str("nothing interesting on this line\n");
        }
    }
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn xgrep_counts_matches_without_metafile() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);

    let output = Command::new(xgrep())
        .args(["-c", "fox", input.to_str().unwrap()])
        .output()
        .expect("failed to run xgrep");

    assert!(output.status.success(), "xgrep -c should exit 0; status: {}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "20");
}

#[test]
fn xgrep_prints_matching_lines_by_default() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);

    let output = Command::new(xgrep())
        .args(["fox", input.to_str().unwrap()])
        .output()
        .expect("failed to run xgrep");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 20);
    assert!(stdout.lines().all(|l| l.contains("fox")));
}

#[test]
fn xgrep_exits_one_on_no_matches() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);

    let status = Command::new(xgrep())
        .args(["no-such-needle-xyz", input.to_str().unwrap()])
        .status()
        .expect("failed to run xgrep");

    assert_eq!(status.code(), Some(1), "no matches in a non-count mode should exit 1");
}

#[test]
fn xgrep_exits_zero_on_zero_count_with_c_flag() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);

    let status = Command::new(xgrep())
        .args(["-c", "no-such-needle-xyz", input.to_str().unwrap()])
        .status()
        .expect("failed to run xgrep");

    assert_eq!(status.code(), Some(0), "-c never signals 'no match' via exit code");
}

#[test]
fn xgrep_exits_two_on_nonexistent_file() {
    let status = Command::new(xgrep())
        .args(["pattern", "/nonexistent_path_abc123_xgrep_test"])
        .status()
        .expect("failed to run xgrep");

    assert_eq!(status.code(), Some(2));
}

#[test]
fn xgrep_exits_one_on_invalid_regex() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);

    let status = Command::new(xgrep())
        .args(["(unclosed", input.to_str().unwrap()])
        .status()
        .expect("failed to run xgrep");

    assert_eq!(status.code(), Some(1), "an invalid regex is a usage error, not an I/O error");
}

#[test]
fn xprep_then_xgrep_finds_same_matches_as_raw_search() {
    let dir = TempDir::new().unwrap();
    let input = make_temp_input(&dir);
    let meta = dir.path().join("input.txt.meta");
    let companion = dir.path().join("input.txt.dat");

    let status = Command::new(xprep())
        .args([
            input.to_str().unwrap(),
            "-o",
            companion.to_str().unwrap(),
            "-m",
            meta.to_str().unwrap(),
            "--chunk-size",
            "256",
        ])
        .status()
        .expect("failed to run xprep");
    assert!(status.success(), "xprep should exit 0");
    assert!(meta.exists());
    assert!(companion.exists());

    let raw = Command::new(xgrep())
        .args(["-c", "fox", input.to_str().unwrap()])
        .output()
        .expect("failed to run xgrep without metafile");
    let via_meta = Command::new(xgrep())
        .args(["-c", "fox", companion.to_str().unwrap(), meta.to_str().unwrap()])
        .output()
        .expect("failed to run xgrep with metafile");

    assert!(raw.status.success());
    assert!(via_meta.status.success());
    assert_eq!(
        String::from_utf8_lossy(&raw.stdout),
        String::from_utf8_lossy(&via_meta.stdout),
        "count should be identical whether or not a metafile is used"
    );
}
