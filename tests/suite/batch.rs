//! End-to-end batch runs against a mock GraphQL endpoint

use gqlbatch_client::Credentials;
use gqlbatch_config::{OAuthLayer, SettingsLayer};
use gqlbatch_engine::{RunError, RunSummary, run};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::common::{Batch, DOUBLE_QUERY, doubling, graphql_url, mount_doubling, rows};

#[tokio::test]
async fn doubles_every_row() {
    let server = MockServer::start().await;
    mount_doubling(&server).await;
    let batch = Batch::new(&[r#"{"x":1}"#, r#"{"x":2}"#, r#"{"x":3}"#]);

    let settings = batch.settings(batch.layer(&graphql_url(&server)));
    let summary = run(&settings, CancellationToken::new()).await.unwrap();

    assert_eq!(
        summary,
        RunSummary {
            rows: 3,
            succeeded: 3,
            failed: 0,
            cancelled: false
        }
    );
    let ok = batch.successes();
    assert_eq!(rows(&ok), [1, 2, 3]);
    for (record, (x, double)) in ok.iter().zip([(1, 2), (2, 4), (3, 6)]) {
        assert_eq!(record["input"], json!({"x": x}));
        assert_eq!(record["output"], json!({"data": {"double": double}}));
        assert_eq!(record["error"], Value::Null);
    }
    assert!(batch.errors().is_empty());
}

#[tokio::test]
async fn sends_query_document_with_variables() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json"))
        .and(body_string(format!(
            r#"{{"query":{},"variables":{{"x":7,"name":"seven"}}}}"#,
            serde_json::to_string(DOUBLE_QUERY).unwrap()
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    let batch = Batch::new(&[r#"{"x":7,"name":"seven"}"#]);

    let settings = batch.settings(batch.layer(&graphql_url(&server)));
    let summary = run(&settings, CancellationToken::new()).await.unwrap();
    assert_eq!(summary.succeeded, 1);
}

#[tokio::test]
async fn server_error_on_one_row_keeps_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(|req: &Request| {
            let body: Value = req.body_json().unwrap();
            if body["variables"]["x"] == json!(2) {
                ResponseTemplate::new(500).set_body_string("internal failure")
            } else {
                doubling(req)
            }
        })
        .mount(&server)
        .await;
    let batch = Batch::new(&[r#"{"x":1}"#, r#"{"x":2}"#, r#"{"x":3}"#]);

    let settings = batch.settings(batch.layer(&graphql_url(&server)));
    let summary = run(&settings, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(rows(&batch.successes()), [1, 3]);

    let errors = batch.errors();
    assert_eq!(rows(&errors), [2]);
    assert_eq!(errors[0]["input"], json!({"x": 2}));
    assert_eq!(errors[0]["output"], json!("internal failure"));
    assert_eq!(errors[0]["error"], json!("invalid status code 500"));
}

#[tokio::test]
async fn malformed_rows_do_not_reach_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(doubling)
        .expect(2)
        .mount(&server)
        .await;
    let batch = Batch::new(&[r#"{"x":1}"#, "{oops", "", r#""just a string""#, r#"{"x":4}"#]);

    let settings = batch.settings(batch.layer(&graphql_url(&server)));
    let summary = run(&settings, CancellationToken::new()).await.unwrap();

    assert_eq!(summary.rows, 4);
    assert_eq!(rows(&batch.successes()), [1, 4]);
    let errors = batch.errors();
    assert_eq!(rows(&errors), [2, 3]);
    for error in &errors {
        assert_eq!(error["input"], Value::Null);
        assert_eq!(error["output"], Value::Null);
        assert!(
            error["error"]
                .as_str()
                .unwrap()
                .starts_with("invalid input record:")
        );
    }
}

#[tokio::test]
async fn static_token_and_headers_reach_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer static-token"))
        .and(header("x-tenant", "acme"))
        .respond_with(doubling)
        .expect(2)
        .mount(&server)
        .await;
    let batch = Batch::new(&[r#"{"x":1}"#, r#"{"x":2}"#]);

    let layer = SettingsLayer {
        token: Some("static-token".into()),
        headers: Some(vec!["X-Tenant: acme".into()]),
        ..batch.layer(&graphql_url(&server))
    };
    let settings = batch.settings(layer);
    assert!(matches!(settings.credentials, Credentials::Static(_)));

    let summary = run(&settings, CancellationToken::new()).await.unwrap();
    assert_eq!(summary.succeeded, 2);
}

fn oauth_layer(server: &MockServer) -> OAuthLayer {
    OAuthLayer {
        url: Some(format!("{}/oauth/token", server.uri())),
        client_id: Some("batch".into()),
        client_secret: Some("s3cret".into()),
        scope: Some("graphql".into()),
    }
}

#[tokio::test]
async fn oauth_token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string("grant_type=client_credentials&scope=graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "fresh", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(doubling)
        .expect(6)
        .mount(&server)
        .await;
    let batch = Batch::new(&[
        r#"{"x":1}"#,
        r#"{"x":2}"#,
        r#"{"x":3}"#,
        r#"{"x":4}"#,
        r#"{"x":5}"#,
        r#"{"x":6}"#,
    ]);

    let layer = SettingsLayer {
        connections: Some(3),
        oauth: oauth_layer(&server),
        ..batch.layer(&graphql_url(&server))
    };
    let summary = run(&batch.settings(layer), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 6);
    assert!(batch.errors().is_empty());
}

#[tokio::test]
async fn rejected_login_fails_each_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(doubling)
        .expect(0)
        .mount(&server)
        .await;
    let batch = Batch::new(&[r#"{"x":1}"#, r#"{"x":2}"#]);

    let layer = SettingsLayer {
        oauth: oauth_layer(&server),
        ..batch.layer(&graphql_url(&server))
    };
    let summary = run(&batch.settings(layer), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 2);
    let errors = batch.errors();
    assert_eq!(rows(&errors), [1, 2]);
    for error in &errors {
        assert_eq!(
            error["error"],
            json!("authorization failed: invalid status code 401 during login")
        );
        assert_eq!(error["output"], Value::Null);
    }
}

#[tokio::test]
async fn missing_query_file_is_fatal() {
    let server = MockServer::start().await;
    let batch = Batch::new(&[r#"{"x":1}"#]);
    let layer = SettingsLayer {
        query: Some(batch.dir.path().join("absent.graphql")),
        ..batch.layer(&graphql_url(&server))
    };

    let err = run(&batch.settings(layer), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Query { .. }));
    assert!(!batch.output.exists());
}

#[tokio::test]
async fn missing_input_file_is_fatal() {
    let server = MockServer::start().await;
    let batch = Batch::new(&[]);
    let layer = SettingsLayer {
        input: Some(batch.dir.path().join("absent.jsonl")),
        ..batch.layer(&graphql_url(&server))
    };

    let err = run(&batch.settings(layer), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::OpenInput { .. }));
}

#[tokio::test]
async fn empty_input_produces_no_records() {
    let server = MockServer::start().await;
    let batch = Batch::new(&[]);

    let summary = run(
        &batch.settings(batch.layer(&graphql_url(&server))),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary, RunSummary::default());
    assert!(batch.successes().is_empty());
    assert!(batch.errors().is_empty());
}
