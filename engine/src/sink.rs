//! Routing of finished rows to the success and error streams.
//!
//! Writes are blocking `std::io` calls made under a mutex. Async callers run
//! them on the blocking pool (see `dispatch`).

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gqlbatch_types::{CallOutcome, ResultRecord, Row, RowError, VariableSet};
use serde_json::Value;

use crate::io::RecordWriter;
use crate::stats::Stats;

/// Writes each row's record to exactly one of two streams.
///
/// The streams are locked independently. A write failure does not stop the run:
/// the first one is kept for [`ResultSink::finish`] and later records are still
/// counted.
pub struct ResultSink {
    success: Mutex<Box<dyn RecordWriter>>,
    errors: Mutex<Box<dyn RecordWriter>>,
    stats: Arc<dyn Stats>,
    write_error: Mutex<Option<io::Error>>,
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSink")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultSink {
    pub fn new(
        success: Box<dyn RecordWriter>,
        errors: Box<dyn RecordWriter>,
        stats: Arc<dyn Stats>,
    ) -> Self {
        Self {
            success: Mutex::new(success),
            errors: Mutex::new(errors),
            stats,
            write_error: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn stats(&self) -> Arc<dyn Stats> {
        Arc::clone(&self.stats)
    }

    pub fn record_success(&self, row: Row, input: VariableSet, output: Value) {
        self.stats.add_processed();
        let record = ResultRecord::success(row, input, output);
        let result = lock(&self.success).write_record(&record);
        self.note(row, result);
    }

    pub fn record_failure(
        &self,
        row: Row,
        input: Option<VariableSet>,
        output: Option<Value>,
        error: &RowError,
    ) {
        self.stats.add_error();
        self.stats.add_processed();
        tracing::debug!(row = %row, error = %error, "Row failed");
        let record = ResultRecord::failure(row, input, output, error);
        let result = lock(&self.errors).write_record(&record);
        self.note(row, result);
    }

    /// Record a call outcome. Returns `true` if the row went to the error stream.
    pub fn record(&self, row: Row, input: VariableSet, outcome: CallOutcome) -> bool {
        match outcome {
            CallOutcome::Success(output) => {
                self.record_success(row, input, output);
                false
            }
            CallOutcome::Failure { error, partial } => {
                self.record_failure(row, Some(input), partial, &error);
                true
            }
        }
    }

    fn note(&self, row: Row, result: io::Result<()>) {
        if let Err(e) = result {
            let mut slot = lock(&self.write_error);
            if slot.is_none() {
                tracing::error!(row = %row, error = %e, "Failed to write result record");
                *slot = Some(e);
            }
        }
    }

    /// Flush both streams and report the first write failure, if any.
    pub fn finish(&self) -> io::Result<()> {
        let flushed = lock(&self.success)
            .flush()
            .and(lock(&self.errors).flush());
        match lock(&self.write_error).take() {
            Some(e) => Err(e),
            None => flushed,
        }
    }
}
