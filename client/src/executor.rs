//! One GraphQL call per variable set.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use gqlbatch_types::{CallOutcome, RowError, VariableSet};

use crate::auth::TokenAuthority;
use crate::read_capped_body;

/// Performs one call for one row.
///
/// Implementations must be safe to invoke from many tasks at once and must fold
/// every failure into [`CallOutcome::Failure`].
pub trait CallExecutor: Send + Sync + 'static {
    fn execute(&self, variables: &VariableSet) -> impl Future<Output = CallOutcome> + Send;
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a VariableSet,
}

/// HTTP implementation of [`CallExecutor`] for a fixed endpoint and query document.
#[derive(Debug)]
pub struct GraphqlClient {
    http: reqwest::Client,
    endpoint: Url,
    query: Arc<str>,
    headers: HeaderMap,
    auth: TokenAuthority,
}

impl GraphqlClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        endpoint: Url,
        query: impl Into<Arc<str>>,
        headers: HeaderMap,
        auth: TokenAuthority,
    ) -> Self {
        Self {
            http,
            endpoint,
            query: query.into(),
            headers,
            auth,
        }
    }

    async fn call(&self, variables: &VariableSet) -> CallOutcome {
        let token = match self.auth.current_token().await {
            Ok(token) => token,
            Err(e) => return CallOutcome::failure(RowError::Auth(e.to_string())),
        };

        let body = GraphqlRequest {
            query: &self.query,
            variables,
        };
        let mut request = match self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(&body)
            .build()
        {
            Ok(request) => request,
            Err(e) => return CallOutcome::failure(RowError::Transport(e.to_string())),
        };

        // Configured headers must not override these two.
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            match HeaderValue::from_str(&token.authorization_value()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    return CallOutcome::failure(RowError::Auth(
                        "access token contains characters not allowed in a header".to_string(),
                    ));
                }
            }
        }

        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "GraphQL request failed");
                return CallOutcome::failure(RowError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_body(response).await;
            tracing::debug!(status = %status, body_bytes = body.len(), "GraphQL request rejected");
            let partial = (!body.is_empty())
                .then(|| Value::String(String::from_utf8_lossy(&body).into_owned()));
            return CallOutcome::Failure {
                error: RowError::RemoteStatus {
                    status: status.as_u16(),
                },
                partial,
            };
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return CallOutcome::failure(RowError::Transport(e.to_string())),
        };
        match serde_json::from_slice::<Value>(&body) {
            Ok(decoded) => CallOutcome::Success(decoded),
            Err(e) => CallOutcome::failure(RowError::ResponseDecode(e.to_string())),
        }
    }
}

impl CallExecutor for GraphqlClient {
    fn execute(&self, variables: &VariableSet) -> impl Future<Output = CallOutcome> + Send {
        self.call(variables)
    }
}
