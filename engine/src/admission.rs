//! Admission control: at most `limit` calls outstanding at once.
//!
//! A permit is taken before a row's task is spawned and moves into that task,
//! so waiting rows never occupy a task slot. Dropping the permit (including by
//! unwinding) returns the slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gqlbatch_types::ConcurrencyLimit;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("admission cancelled")]
pub struct AdmissionCancelled;

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> usize {
        let current = self.current.fetch_add(1, Ordering::Relaxed) + 1;
        let mut peak = self.peak.load(Ordering::Relaxed);
        while current > peak {
            match self.peak.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
        current
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
}

/// One admitted call. The slot is released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<InFlight>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight.leave();
    }
}

impl AdmissionController {
    #[must_use]
    pub fn new(limit: ConcurrencyLimit) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.get())),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Wait for a free slot, or until `cancel` fires.
    ///
    /// Waiters are granted slots in arrival order. Cancellation is checked first,
    /// so an already-cancelled token never yields a permit.
    pub async fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> Result<AdmissionPermit, AdmissionCancelled> {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AdmissionCancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // The semaphore is never closed; treat closure like cancellation.
                permit.map_err(|_| AdmissionCancelled)?
            }
        };

        let current = self.in_flight.enter();
        tracing::trace!(in_flight = current, "Admitted call");
        Ok(AdmissionPermit {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Slots currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.current.load(Ordering::Relaxed)
    }

    /// Highest number of slots held at once so far.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::Relaxed)
    }

    /// Free slots right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
