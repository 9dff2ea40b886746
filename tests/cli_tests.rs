use assert_cmd::Command;
use assert_fs::prelude::*;
use std::path::Path;

/// Binary with an isolated (absent) config file.
fn sponge(config_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sponge"));
    cmd.env("SPONGE_CONFIG", config_dir.join("absent.xml"));
    cmd
}

#[test]
fn no_file_writes_stdout() {
    let dir = assert_fs::TempDir::new().unwrap();
    let out = sponge(dir.path()).write_stdin("abc\n").output().unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"abc\n");
}

#[test]
fn dash_writes_stdout() {
    let dir = assert_fs::TempDir::new().unwrap();
    let out = sponge(dir.path())
        .arg("-")
        .write_stdin("xyz")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"xyz");
}

#[test]
fn plain_write_truncates_file() {
    let dir = assert_fs::TempDir::new().unwrap();
    let f = dir.child("out.txt");
    f.write_str("a longer old body").unwrap();

    let out = sponge(dir.path())
        .arg(f.path())
        .write_stdin("new")
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
    f.assert("new");
}

#[test]
fn plain_append() {
    let dir = assert_fs::TempDir::new().unwrap();
    let f = dir.child("out.txt");
    f.write_str("old").unwrap();

    sponge(dir.path())
        .args(["-a"])
        .arg(f.path())
        .write_stdin("new")
        .assert()
        .success();
    f.assert("oldnew");
}

#[test]
fn atomic_replace_and_append() {
    let dir = assert_fs::TempDir::new().unwrap();
    let f = dir.child("out.txt");
    f.write_str("old").unwrap();

    sponge(dir.path())
        .arg("-r")
        .arg(f.path())
        .write_stdin("mid")
        .assert()
        .success();
    f.assert("mid");

    sponge(dir.path())
        .args(["-a", "-r", "--no-fsync", "--retry-limit", "5"])
        .arg(f.path())
        .write_stdin("+end")
        .assert()
        .success();
    f.assert("mid+end");

    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn atomic_into_missing_directory_fails_with_message() {
    let dir = assert_fs::TempDir::new().unwrap();
    let target = dir.path().join("missing").join("out.txt");

    let out = sponge(dir.path())
        .arg("-r")
        .arg(&target)
        .write_stdin("data")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("sponge: error:"), "stderr: {stderr}");
    assert!(stderr.contains("out.txt"), "stderr: {stderr}");
    assert!(stderr.contains("not found"), "stderr: {stderr}");
    assert!(!target.exists());
}

#[test]
fn json_logs_go_to_stderr_as_json() {
    let dir = assert_fs::TempDir::new().unwrap();
    let f = dir.child("out.txt");
    f.write_str("old").unwrap();

    let out = sponge(dir.path())
        .args(["--json", "--log-level", "debug", "-r"])
        .arg(f.path())
        .write_stdin("new")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(out.stdout.is_empty(), "logs must not reach stdout");
    f.assert("new");

    let stderr = String::from_utf8(out.stderr).unwrap();
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    assert!(!lines.is_empty(), "expected debug logs on stderr");
    for line in lines {
        let v: serde_json::Value = serde_json::from_str(line)
            .unwrap_or_else(|e| panic!("not JSON ({e}): {line}"));
        assert!(v.get("level").is_some(), "missing level: {line}");
    }
}

#[test]
fn log_file_receives_events() {
    let dir = assert_fs::TempDir::new().unwrap();
    // File logging refuses symlinked ancestors (e.g. /tmp on macOS).
    let base = std::fs::canonicalize(dir.path()).unwrap();
    let f = dir.child("out.txt");
    let log = base.join("logs").join("sponge.log");

    sponge(dir.path())
        .args(["--log-level", "info", "-r", "--log-file"])
        .arg(&log)
        .arg(f.path())
        .write_stdin("payload")
        .assert()
        .success();
    f.assert("payload");
    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("replaced atomically"), "log was: {text}");
}

#[test]
fn malformed_config_is_an_error() {
    let dir = assert_fs::TempDir::new().unwrap();
    let cfg = dir.child("config.xml");
    cfg.write_str("<config><retry_limit>0</retry_limit></config>").unwrap();

    let out = Command::new(assert_cmd::cargo::cargo_bin!("sponge"))
        .env("SPONGE_CONFIG", cfg.path())
        .write_stdin("x")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("retry_limit"), "stderr: {stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn zero_retry_limit_flag_is_rejected() {
    let dir = assert_fs::TempDir::new().unwrap();
    sponge(dir.path())
        .args(["--retry-limit", "0", "-r", "x"])
        .write_stdin("x")
        .assert()
        .failure();
}
