//! Batch engine for gqlbatch: bounded concurrent dispatch of GraphQL calls.
//!
//! # Architecture
//!
//! | Module | Role |
//! |--------|------|
//! | [`admission`] | Semaphore-backed slots; cancellable acquire |
//! | [`dispatch`] | Read, number, admit and spawn rows; drain at end of input |
//! | [`sink`] | Route each finished row to the success or error stream |
//! | [`stats`] | Processed/error counters and the periodic progress log |
//! | [`io`] | Streaming JSON reader and JSON-lines writers over files and stdio |
//!
//! [`run`] wires these together from validated [`RunSettings`]. [`run_with`]
//! takes the pieces directly and is what tests drive.

pub mod admission;
pub mod dispatch;
pub mod io;
pub mod sink;
pub mod stats;

pub use admission::{AdmissionCancelled, AdmissionController, AdmissionPermit};
pub use dispatch::{RunSummary, dispatch};
pub use io::{JsonLinesWriter, JsonRecordReader, ReadError, RecordReader, RecordWriter, StdStream};
pub use sink::ResultSink;
pub use stats::{ProgressReporter, REPORT_INTERVAL, SilentStats, Stats, StatsSnapshot, VerboseStats};

pub use gqlbatch_config::RunSettings;

use std::path::PathBuf;
use std::sync::Arc;

use gqlbatch_client::{CallExecutor, GraphqlClient, TokenAuthority, build_http_client};
use gqlbatch_types::ConcurrencyLimit;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Failures that stop a run before or after dispatch. Per-row failures never
/// surface here; they become error records.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read query file {}: {source}", path.display())]
    Query {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to open input file {}: {source}", path.display())]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create output file {}: {source}", path.display())]
    OpenOutput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] gqlbatch_client::reqwest::Error),
    #[error("failed to write results: {0}")]
    Output(#[source] std::io::Error),
}

/// Execute one batch as described by `settings`.
///
/// Cancelling `cancel` stops reading input; admitted rows still finish and are
/// recorded before this returns.
pub async fn run(
    settings: &RunSettings,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError> {
    let query = tokio::fs::read_to_string(&settings.query)
        .await
        .map_err(|source| RunError::Query {
            path: settings.query.clone(),
            source,
        })?;

    let mut reader = io::open_input(settings.input.as_deref()).await?;
    let output = io::open_output(settings.output.as_deref(), StdStream::Stdout)?;
    let errors = io::open_output(settings.error.as_deref(), StdStream::Stderr)?;

    let http = build_http_client(settings.concurrency)?;
    let auth = TokenAuthority::new(settings.credentials.clone(), http.clone());
    let client = GraphqlClient::new(
        http,
        settings.endpoint.clone(),
        query,
        settings.headers.clone(),
        auth,
    );

    let stats: Arc<dyn Stats> = if settings.verbose {
        Arc::new(VerboseStats::default())
    } else {
        Arc::new(SilentStats)
    };

    tracing::info!(
        endpoint = %settings.endpoint,
        connections = settings.concurrency.get(),
        "Starting batch"
    );

    let sink = ResultSink::new(output, errors, stats);
    run_with(
        &mut reader,
        Arc::new(client),
        sink,
        settings.concurrency,
        settings.verbose,
        cancel,
    )
    .await
}

/// Run a batch from already-opened parts.
pub async fn run_with<R, E>(
    reader: &mut R,
    executor: Arc<E>,
    sink: ResultSink,
    limit: ConcurrencyLimit,
    report_progress: bool,
    cancel: CancellationToken,
) -> Result<RunSummary, RunError>
where
    R: RecordReader,
    E: CallExecutor,
{
    let sink = Arc::new(sink);
    let admission = AdmissionController::new(limit);
    let reporter = report_progress
        .then(|| ProgressReporter::spawn(sink.stats(), REPORT_INTERVAL));

    let summary = dispatch(reader, executor, &admission, Arc::clone(&sink), &cancel).await;

    if let Some(reporter) = reporter {
        reporter.stop().await;
    }
    sink.finish().map_err(RunError::Output)?;

    tracing::info!(
        rows = summary.rows,
        succeeded = summary.succeeded,
        failed = summary.failed,
        peak_in_flight = admission.peak_in_flight(),
        cancelled = summary.cancelled,
        "Batch finished"
    );
    Ok(summary)
}
