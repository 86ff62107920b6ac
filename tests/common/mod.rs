//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use gqlbatch_config::{RunSettings, SettingsLayer};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const DOUBLE_QUERY: &str = "query Double($x: Int!) { double(x: $x) }";

/// A temporary batch: query file, input file and the two result paths.
pub struct Batch {
    pub dir: TempDir,
    pub query: PathBuf,
    pub input: PathBuf,
    pub output: PathBuf,
    pub error: PathBuf,
}

impl Batch {
    pub fn new(input_lines: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let query = dir.path().join("query.graphql");
        let input = dir.path().join("input.jsonl");
        std::fs::write(&query, DOUBLE_QUERY).unwrap();
        let mut content = input_lines.join("\n");
        content.push('\n');
        std::fs::write(&input, content).unwrap();
        Self {
            output: dir.path().join("output.jsonl"),
            error: dir.path().join("error.jsonl"),
            dir,
            query,
            input,
        }
    }

    /// Flag layer pointing at `endpoint` and this batch's files.
    pub fn layer(&self, endpoint: &str) -> SettingsLayer {
        SettingsLayer {
            url: Some(endpoint.to_string()),
            query: Some(self.query.clone()),
            input: Some(self.input.clone()),
            output: Some(self.output.clone()),
            error: Some(self.error.clone()),
            ..SettingsLayer::default()
        }
    }

    pub fn settings(&self, layer: SettingsLayer) -> RunSettings {
        RunSettings::resolve(layer).unwrap()
    }

    pub fn successes(&self) -> Vec<Value> {
        read_records(&self.output)
    }

    pub fn errors(&self) -> Vec<Value> {
        read_records(&self.error)
    }
}

/// Parse a JSON-lines result file, sorted by row.
pub fn read_records(path: &Path) -> Vec<Value> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let mut records: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    records.sort_by_key(|record| record["row"].as_u64());
    records
}

pub fn rows(records: &[Value]) -> Vec<u64> {
    records.iter().filter_map(|r| r["row"].as_u64()).collect()
}

pub fn graphql_url(server: &MockServer) -> String {
    format!("{}/graphql", server.uri())
}

/// Answer `{"data":{"double":2x}}` for the request's `x` variable.
pub fn doubling(req: &Request) -> ResponseTemplate {
    let body: Value = req.body_json().unwrap();
    let x = body["variables"]["x"].as_i64().unwrap();
    ResponseTemplate::new(200).set_body_json(json!({"data": {"double": x * 2}}))
}

pub async fn mount_doubling(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(doubling)
        .mount(server)
        .await;
}
