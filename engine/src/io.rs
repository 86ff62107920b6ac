//! JSON record input and JSON-lines output.
//!
//! The dispatch loop only sees [`RecordReader`] and [`RecordWriter`]; this module
//! provides the streaming implementations and the file/stdio plumbing.

use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gqlbatch_types::{ResultRecord, VariableSet, VariableSetError};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::RunError;

#[derive(Debug, Error)]
pub enum ReadError {
    /// The record was read but is not a usable variable set. Reading can continue.
    #[error(transparent)]
    Record(#[from] VariableSetError),
    /// The input itself failed. No further records can be read.
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Ordered source of variable sets. `None` marks end of input.
pub trait RecordReader: Send {
    fn next_record(
        &mut self,
    ) -> impl Future<Output = Option<Result<VariableSet, ReadError>>> + Send;
}

/// Destination for whole result records.
pub trait RecordWriter: Send {
    fn write_record(&mut self, record: &ResultRecord) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Reads a stream of JSON values, usually one object per line.
///
/// Objects may also be concatenated on one line or pretty-printed across
/// several. Whitespace between values is skipped. After a syntax error the rest
/// of the offending line is discarded and reading resumes on the next line.
#[derive(Debug)]
pub struct JsonRecordReader<R> {
    inner: R,
    buf: Vec<u8>,
    eof: bool,
}

enum Decoded {
    Value(Value),
    Invalid(serde_json::Error),
    Incomplete(serde_json::Error),
    Nothing,
}

impl<R> JsonRecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            eof: false,
        }
    }

    fn skip_whitespace(&mut self) {
        let start = self
            .buf
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buf.len());
        self.buf.drain(..start);
    }

    /// Decode the first value in the buffer. The buffer starts with a non-whitespace byte.
    fn decode(&mut self) -> Decoded {
        let mut values = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) => {
                let end = values.byte_offset();
                self.buf.drain(..end);
                Decoded::Value(value)
            }
            Some(Err(e)) if e.is_eof() => Decoded::Incomplete(e),
            Some(Err(e)) => {
                self.discard_through_line(e.line());
                Decoded::Invalid(e)
            }
            None => {
                self.buf.clear();
                Decoded::Nothing
            }
        }
    }

    /// Drop buffered bytes up to and including the end of 1-based `line`.
    fn discard_through_line(&mut self, line: usize) {
        let end = self
            .buf
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b == b'\n')
            .nth(line.saturating_sub(1))
            .map_or(self.buf.len(), |(i, _)| i + 1);
        self.buf.drain(..end);
    }
}

impl<R> RecordReader for JsonRecordReader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_record(&mut self) -> Option<Result<VariableSet, ReadError>> {
        loop {
            self.skip_whitespace();
            if !self.buf.is_empty() {
                match self.decode() {
                    Decoded::Value(value) => {
                        return Some(VariableSet::from_value(value).map_err(ReadError::from));
                    }
                    Decoded::Invalid(e) => {
                        return Some(Err(ReadError::Record(VariableSetError::from(e))));
                    }
                    Decoded::Incomplete(e) if self.eof => {
                        self.buf.clear();
                        return Some(Err(ReadError::Record(VariableSetError::from(e))));
                    }
                    Decoded::Incomplete(_) | Decoded::Nothing => {}
                }
            } else if self.eof {
                return None;
            }

            match self.inner.read_until(b'\n', &mut self.buf).await {
                Ok(0) => self.eof = true,
                Ok(_) => {}
                Err(e) => return Some(Err(ReadError::Io(e))),
            }
        }
    }
}

/// Writes each record as one JSON line.
pub struct JsonLinesWriter<W> {
    inner: W,
    line: Vec<u8>,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Send> RecordWriter for JsonLinesWriter<W> {
    fn write_record(&mut self, record: &ResultRecord) -> io::Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, record)?;
        self.line.push(b'\n');
        // One write per record so lines from concurrent rows never interleave.
        self.inner.write_all(&self.line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub type BoxedInput = JsonRecordReader<Box<dyn AsyncBufRead + Unpin + Send>>;
pub type BoxedOutput = Box<dyn RecordWriter>;

/// Open the input file, or stdin for `None`.
pub async fn open_input(path: Option<&Path>) -> Result<BoxedInput, RunError> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| RunError::OpenInput {
                    path: path.to_path_buf(),
                    source,
                })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    Ok(JsonRecordReader::new(reader))
}

/// Which standard stream a result stream falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

/// Create (truncate) the output file, or use the given standard stream for `None`.
pub fn open_output(path: Option<&Path>, fallback: StdStream) -> Result<BoxedOutput, RunError> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| RunError::OpenOutput {
                path: PathBuf::from(path),
                source,
            })?;
            Ok(Box::new(JsonLinesWriter::new(io::BufWriter::new(file))))
        }
        None => {
            let writer: BoxedOutput = match fallback {
                StdStream::Stdout => Box::new(JsonLinesWriter::new(io::stdout())),
                StdStream::Stderr => Box::new(JsonLinesWriter::new(io::stderr())),
            };
            Ok(writer)
        }
    }
}
