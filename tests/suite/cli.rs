//! Binary-level behaviour: exit codes and the version command

use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::json;
use wiremock::MockServer;

use crate::common::{Batch, graphql_url, mount_doubling, read_records, rows};

/// The binary with a scratch home and no inherited `GQLBATCH_*` settings.
fn gqlbatch(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gqlbatch"));
    cmd.env("HOME", home).stdin(Stdio::null());
    for (key, _) in std::env::vars_os() {
        if key.to_string_lossy().starts_with("GQLBATCH_") {
            cmd.env_remove(&key);
        }
    }
    cmd
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn short_version_prints_only_the_version() {
    let home = tempfile::tempdir().unwrap();
    let output = gqlbatch(home.path())
        .args(["version", "--short"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn version_reports_missing_config() {
    let home = tempfile::tempdir().unwrap();
    let output = gqlbatch(home.path()).arg("version").output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Configuration: none"), "{stdout}");
}

#[test]
fn missing_url_exits_with_failure() {
    let home = tempfile::tempdir().unwrap();
    let batch = Batch::new(&[r#"{"x":1}"#]);
    let output = gqlbatch(home.path())
        .arg("-q")
        .arg(&batch.query)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("url"), "{}", stderr(&output));
}

#[test]
fn zero_connections_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let batch = Batch::new(&[r#"{"x":1}"#]);
    let output = gqlbatch(home.path())
        .args(["-u", "http://127.0.0.1:9/graphql", "-c", "0"])
        .arg("-q")
        .arg(&batch.query)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!batch.output.exists());
}

#[test]
fn token_with_oauth_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let output = gqlbatch(home.path())
        .args(["-t", "abc", "--oauth.url", "https://auth.example.com/token"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[cfg(unix)]
#[test]
fn interrupt_while_waiting_on_stdin_exits_130() {
    use std::time::{Duration, Instant};

    let home = tempfile::tempdir().unwrap();
    let batch = Batch::new(&[]);
    let mut child = gqlbatch(home.path())
        .args(["-u", "http://127.0.0.1:9/graphql"])
        .arg("-q")
        .arg(&batch.query)
        .arg("-o")
        .arg(&batch.output)
        .arg("-e")
        .arg(&batch.error)
        .stdin(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    // Keep stdin open with nothing written so the reader stays blocked.
    let stdin = child.stdin.take();

    std::thread::sleep(Duration::from_millis(1000));
    let status = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let exit = loop {
        if let Some(exit) = child.try_wait().unwrap() {
            break exit;
        }
        if Instant::now() > deadline {
            child.kill().unwrap();
            panic!("gqlbatch still running 10s after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    drop(stdin);

    assert_eq!(exit.code(), Some(130));
    assert!(read_records(&batch.output).is_empty());
}

#[tokio::test]
async fn runs_a_batch_from_files() {
    let server = MockServer::start().await;
    mount_doubling(&server).await;
    let home = tempfile::tempdir().unwrap();
    let batch = Batch::new(&[r#"{"x":1}"#, r#"{"x":2}"#, "not json"]);

    let mut cmd = gqlbatch(home.path());
    cmd.args(["-u", &graphql_url(&server), "-c", "2"])
        .arg("-q")
        .arg(&batch.query)
        .arg("-i")
        .arg(&batch.input)
        .arg("-o")
        .arg(&batch.output)
        .arg("-e")
        .arg(&batch.error);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let ok = read_records(&batch.output);
    assert_eq!(rows(&ok), [1, 2]);
    assert_eq!(ok[1]["output"], json!({"data": {"double": 4}}));
    assert_eq!(rows(&batch.errors()), [3]);
}

#[tokio::test]
async fn config_file_supplies_the_endpoint() {
    let server = MockServer::start().await;
    mount_doubling(&server).await;
    let home = tempfile::tempdir().unwrap();
    let batch = Batch::new(&[r#"{"x":5}"#]);

    let config = batch.dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!("url = \"{}\"\nconnections = 1\n", graphql_url(&server)),
    )
    .unwrap();

    let mut cmd = gqlbatch(home.path());
    cmd.arg("--config")
        .arg(&config)
        .arg("-q")
        .arg(&batch.query)
        .arg("-i")
        .arg(&batch.input)
        .arg("-o")
        .arg(&batch.output)
        .arg("-e")
        .arg(&batch.error);
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        batch.successes()[0]["output"],
        json!({"data": {"double": 10}})
    );
}
