//! Core domain types for gqlbatch.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod ids;
mod outcome;
mod variables;

pub use ids::Row;
pub use outcome::{CallOutcome, ResultRecord, RowError};
pub use variables::{VariableSet, VariableSetError};

use std::num::NonZeroUsize;
use thiserror::Error;

// ============================================================================
// Concurrency Limit
// ============================================================================

/// Default number of simultaneous in-flight calls.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Upper bound on simultaneous in-flight calls.
///
/// Validated at construction: the admission controller can never be built with
/// zero permits, so a run that would deadlock on its first row is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConcurrencyLimit(NonZeroUsize);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("concurrency limit must be a positive integer (got {0})")]
pub struct InvalidConcurrencyLimit(pub i64);

impl ConcurrencyLimit {
    /// Validate a raw (possibly negative) limit as supplied by flags or config.
    pub fn new(raw: i64) -> Result<Self, InvalidConcurrencyLimit> {
        usize::try_from(raw)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or(InvalidConcurrencyLimit(raw))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self(NonZeroUsize::MIN.saturating_add(DEFAULT_CONCURRENCY - 1))
    }
}

impl std::fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Credential Types
// ============================================================================

/// A bearer token.
///
/// Note: `Debug` is manually implemented to redact the token value, preventing accidental
/// credential disclosure in logs or error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Returns `None` for empty (or whitespace-only) values: an empty token
    /// means "send no Authorization header".
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BearerToken(<redacted>)")
    }
}
