//! Atomic counters for the monitoring loop.
//!
//! Owned by the supervisor and shared with its controller. Call
//! [`Metrics::flush`] to emit the current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{CycleOutcome, CycleStatus, RiskLevel};

/// Lightweight atomic counters, no allocations, no locking.
#[derive(Debug)]
pub struct Metrics {
    cycles: AtomicU64,
    faults: AtomicU64,
    no_reading: AtomicU64,
    capture_failures: AtomicU64,
    classification_failures: AtomicU64,
    unknown_results: AtomicU64,
    alarms_raised: AtomicU64,
    actuation_errors: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            no_reading: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
            classification_failures: AtomicU64::new(0),
            unknown_results: AtomicU64::new(0),
            alarms_raised: AtomicU64::new(0),
            actuation_errors: AtomicU64::new(0),
        }
    }

    /// Account for one finished cycle.
    pub fn record(&self, outcome: &CycleOutcome) {
        self.cycles.fetch_add(1, Ordering::Relaxed);

        let counter = match &outcome.status {
            CycleStatus::Faulted { .. } => Some(&self.faults),
            CycleStatus::NoReading => Some(&self.no_reading),
            CycleStatus::CaptureFailed { .. } => Some(&self.capture_failures),
            CycleStatus::ClassificationFailed { .. } => Some(&self.classification_failures),
            CycleStatus::Classified | CycleStatus::Cancelled => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(result) = &outcome.classification {
            if result.risk_level == RiskLevel::Unknown {
                self.unknown_results.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(report) = &outcome.actuation {
            self.alarms_raised.fetch_add(1, Ordering::Relaxed);
            self.actuation_errors
                .fetch_add(report.errors.len() as u64, Ordering::Relaxed);
        }
        tracing::trace!(metric = "cycles", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            cycles = self.cycles(),
            faults = self.faults(),
            no_reading = self.no_reading(),
            capture_failures = self.capture_failures(),
            classification_failures = self.classification_failures(),
            unknown_results = self.unknown_results(),
            alarms_raised = self.alarms_raised(),
            actuation_errors = self.actuation_errors(),
        );
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub fn no_reading(&self) -> u64 {
        self.no_reading.load(Ordering::Relaxed)
    }

    pub fn capture_failures(&self) -> u64 {
        self.capture_failures.load(Ordering::Relaxed)
    }

    pub fn classification_failures(&self) -> u64 {
        self.classification_failures.load(Ordering::Relaxed)
    }

    pub fn unknown_results(&self) -> u64 {
        self.unknown_results.load(Ordering::Relaxed)
    }

    pub fn alarms_raised(&self) -> u64 {
        self.alarms_raised.load(Ordering::Relaxed)
    }

    pub fn actuation_errors(&self) -> u64 {
        self.actuation_errors.load(Ordering::Relaxed)
    }
}
