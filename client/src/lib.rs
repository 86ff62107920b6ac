//! GraphQL HTTP client for batch execution.
//!
//! # Architecture
//!
//! - [`build_http_client`] - One pooled `reqwest::Client` per run, sized to the concurrency limit
//! - [`headers`] - Parsing of `Name: value` header lines into a [`reqwest::header::HeaderMap`]
//! - [`auth`] - The token authority: no auth, a static bearer token, or OAuth2 client credentials
//! - [`executor`] - The [`CallExecutor`] seam and its HTTP implementation [`GraphqlClient`]
//!
//! # Error Handling
//!
//! Calls never return `Result::Err`. Every failure mode (auth, transport, status, decode)
//! is folded into a [`CallOutcome::Failure`] so that one bad row can't stop the batch.
//!
//! [`CallOutcome::Failure`]: gqlbatch_types::CallOutcome::Failure

pub mod auth;
pub mod executor;
pub mod headers;

pub use auth::{AuthError, Clock, Credentials, OAuthCredentials, SystemClock, TokenAuthority};
pub use executor::{CallExecutor, GraphqlClient};
pub use headers::{HeaderParseError, parse_headers};

pub use gqlbatch_types;
pub use reqwest;

use std::time::Duration;

use gqlbatch_types::ConcurrencyLimit;

const CONNECT_TIMEOUT_SECS: u64 = 30;

// Note: reqwest only exposes tcp_keepalive (idle time); interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Upper bound on how much of a non-2xx body is kept for diagnostics.
const MAX_ERROR_BODY_BYTES: usize = 1024 * 1024;

const USER_AGENT: &str = concat!("gqlbatch/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client for a run.
///
/// The idle pool is sized to the concurrency limit so that every admitted call can
/// reuse a warm connection. reqwest has no per-host connection cap; the admission
/// controller is what bounds simultaneous connections.
pub fn build_http_client(limit: ConcurrencyLimit) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .pool_max_idle_per_host(limit.get())
        .build()
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .user_agent(USER_AGENT)
}

/// Read a response body, keeping at most [`MAX_ERROR_BODY_BYTES`].
///
/// Bytes read before a mid-body transport error are returned as-is.
pub async fn read_capped_body(response: reqwest::Response) -> Vec<u8> {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            break;
        }
    }
    body
}
