//! The dispatch loop.
//!
//! Reads records in order, numbers them, and spawns one task per admitted row.
//! Admission happens before the spawn, so the number of live tasks never
//! exceeds the concurrency limit. Every row that is read produces exactly one
//! record, including rows that fail to parse, rows whose admission is
//! cancelled, and rows whose task panics.

use std::collections::HashMap;
use std::sync::Arc;

use gqlbatch_client::CallExecutor;
use gqlbatch_types::{Row, RowError};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::admission::AdmissionController;
use crate::io::{ReadError, RecordReader};
use crate::sink::ResultSink;

/// Row counts for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows read from input; each was assigned a row number.
    pub rows: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// The run stopped reading early because of cancellation.
    pub cancelled: bool,
}

struct Tasks {
    set: JoinSet<bool>,
    rows: HashMap<task::Id, Row>,
}

impl Tasks {
    fn new() -> Self {
        Self {
            set: JoinSet::new(),
            rows: HashMap::new(),
        }
    }

    fn settle(
        &mut self,
        joined: Result<(task::Id, bool), JoinError>,
        sink: &ResultSink,
        summary: &mut RunSummary,
    ) {
        match joined {
            Ok((id, failed)) => {
                self.rows.remove(&id);
                if failed {
                    summary.failed += 1;
                } else {
                    summary.succeeded += 1;
                }
            }
            Err(e) => {
                summary.failed += 1;
                let Some(row) = self.rows.remove(&e.id()) else {
                    tracing::error!(error = %e, "Unknown call task failed");
                    return;
                };
                tracing::error!(row = %row, error = %e, "Call task failed");
                sink.record_failure(row, None, None, &RowError::TaskFailed(e.to_string()));
            }
        }
    }
}

/// Run a blocking sink write on the blocking pool so a slow consumer of the
/// output streams never parks a runtime worker.
async fn off_runtime<T, F>(write: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match task::spawn_blocking(write).await {
        Ok(value) => value,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Run every record from `reader` through `executor`.
///
/// Returns once input is exhausted (or cancelled) and every admitted row has
/// been recorded.
pub async fn dispatch<R, E>(
    reader: &mut R,
    executor: Arc<E>,
    admission: &AdmissionController,
    sink: Arc<ResultSink>,
    cancel: &CancellationToken,
) -> RunSummary
where
    R: RecordReader,
    E: CallExecutor,
{
    let mut summary = RunSummary::default();
    let mut tasks = Tasks::new();
    let mut next_row = Row::first();

    loop {
        while let Some(joined) = tasks.set.try_join_next_with_id() {
            tasks.settle(joined, &sink, &mut summary);
        }

        let record = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                summary.cancelled = true;
                break;
            }
            record = reader.next_record() => record,
        };
        let Some(record) = record else {
            break;
        };

        let row = next_row;
        next_row = next_row.next();
        summary.rows += 1;

        let variables = match record {
            Ok(variables) => variables,
            Err(ReadError::Record(e)) => {
                tracing::debug!(row = %row, error = %e, "Invalid input record");
                let error = RowError::InputRead(e.to_string());
                let sink = Arc::clone(&sink);
                off_runtime(move || sink.record_failure(row, None, None, &error)).await;
                summary.failed += 1;
                continue;
            }
            Err(ReadError::Io(e)) => {
                tracing::error!(row = %row, error = %e, "Input failed; no further rows will be read");
                let error = RowError::InputRead(e.to_string());
                let sink = Arc::clone(&sink);
                off_runtime(move || sink.record_failure(row, None, None, &error)).await;
                summary.failed += 1;
                break;
            }
        };

        let permit = match admission.acquire(cancel).await {
            Ok(permit) => permit,
            Err(_) => {
                let sink = Arc::clone(&sink);
                off_runtime(move || {
                    sink.record_failure(row, Some(variables), None, &RowError::AdmissionCancelled);
                })
                .await;
                summary.failed += 1;
                summary.cancelled = true;
                break;
            }
        };

        let executor = Arc::clone(&executor);
        let task_sink = Arc::clone(&sink);
        let handle = tasks.set.spawn(async move {
            let _permit = permit;
            let outcome = executor.execute(&variables).await;
            off_runtime(move || task_sink.record(row, variables, outcome)).await
        });
        tasks.rows.insert(handle.id(), row);
    }

    let pending = tasks.set.len();
    if pending > 0 {
        tracing::debug!(pending, "Input finished; waiting for in-flight rows");
    }
    while let Some(joined) = tasks.set.join_next_with_id().await {
        tasks.settle(joined, &sink, &mut summary);
    }

    summary
}
