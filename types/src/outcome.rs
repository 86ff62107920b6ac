//! Per-row outcomes and the records they serialize into.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Row, VariableSet};

/// Why a single row failed.
///
/// Every variant is local to its row: none of them stop the dispatch loop or
/// affect other in-flight rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    /// The input record could not be parsed as a variable set.
    #[error("invalid input record: {0}")]
    InputRead(String),
    /// The run was cancelled while this row waited for a free slot.
    #[error("cancelled while waiting for a free connection")]
    AdmissionCancelled,
    /// The credential exchange failed or returned an unusable token.
    #[error("authorization failed: {0}")]
    Auth(String),
    /// The endpoint could not be reached or the response could not be read.
    #[error("request failed: {0}")]
    Transport(String),
    /// The endpoint answered with a non-2xx status.
    #[error("invalid status code {status}")]
    RemoteStatus { status: u16 },
    /// A 2xx response body that is not valid JSON.
    #[error("invalid response body: {0}")]
    ResponseDecode(String),
    /// The task running the call panicked or was aborted.
    #[error("call task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of one call, produced exactly once per row.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// 2xx response with a decoded JSON body.
    Success(Value),
    /// Any failure. `partial` carries the raw response body when the endpoint
    /// supplied one (non-2xx responses only).
    Failure {
        error: RowError,
        partial: Option<Value>,
    },
}

impl CallOutcome {
    #[must_use]
    pub const fn failure(error: RowError) -> Self {
        Self::Failure {
            error,
            partial: None,
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One line of the success or error stream.
///
/// All four keys are always serialized; absent values become `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub row: Row,
    pub input: Option<VariableSet>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ResultRecord {
    #[must_use]
    pub fn success(row: Row, input: VariableSet, output: Value) -> Self {
        Self {
            row,
            input: Some(input),
            output: Some(output),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(
        row: Row,
        input: Option<VariableSet>,
        output: Option<Value>,
        error: &RowError,
    ) -> Self {
        Self {
            row,
            input,
            output,
            error: Some(error.to_string()),
        }
    }
}
