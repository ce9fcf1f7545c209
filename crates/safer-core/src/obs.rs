//! Structured observability hooks for the monitoring loop.
//!
//! - `CycleSpan` RAII guard tagging every event of a cycle with its id
//! - emission functions for the cycle lifecycle and supervisor decisions
//!
//! Verbosity is controlled through `RUST_LOG`; JSON output through the
//! daemon's `--json` flag.

use tracing::{debug, info, warn};

use crate::domain::{CycleOutcome, CycleState};
use crate::ports::LinkCommand;

/// RAII guard that enters a cycle-scoped span.
///
/// Only hold this in synchronous scopes; async code instruments its futures
/// with [`cycle_span`] instead.
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    pub fn enter(cycle_id: u64) -> Self {
        Self {
            _span: cycle_span(cycle_id).entered(),
        }
    }
}

/// Span tagged with the cycle id.
pub fn cycle_span(cycle_id: u64) -> tracing::Span {
    tracing::info_span!("safer.cycle", cycle_id = cycle_id)
}

pub fn emit_cycle_started(cycle_id: u64) {
    info!(event = "cycle.started", cycle_id = cycle_id);
}

pub fn emit_state_changed(from: CycleState, to: CycleState) {
    debug!(event = "cycle.state", from = %from, to = %to);
}

pub fn emit_command_sent(command: LinkCommand) {
    debug!(event = "link.command", command = %command);
}

/// A payload arrived that did not pass the structured-reading predicate.
pub fn emit_reading_discarded(payload: &str) {
    debug!(event = "reading.discarded", payload = %payload);
}

pub fn emit_reading_accepted(raw: &str, polls: u32) {
    info!(event = "reading.accepted", reading = %raw, polls = polls);
}

/// Emit the terminal record of a cycle.
pub fn emit_cycle_finished(outcome: &CycleOutcome) {
    let risk = outcome
        .classification
        .as_ref()
        .map(|c| c.risk_level.as_str())
        .unwrap_or("-");
    if outcome.is_fault() {
        warn!(
            event = "cycle.finished",
            cycle_id = outcome.cycle_id,
            state = %outcome.final_state,
            status = outcome.status.name(),
            duration_ms = outcome.duration_ms,
            detail = ?outcome.status,
        );
    } else {
        info!(
            event = "cycle.finished",
            cycle_id = outcome.cycle_id,
            state = %outcome.final_state,
            status = outcome.status.name(),
            risk = risk,
            actuated = outcome.actuated(),
            duration_ms = outcome.duration_ms,
        );
    }
    if let Ok(record) = serde_json::to_string(outcome) {
        debug!(event = "cycle.audit", record = %record);
    }
}

/// Emit a best-effort step failure (alarm command, speech, link cleanup).
pub fn emit_step_error(step: &str, error: &dyn std::fmt::Display) {
    warn!(event = "cycle.step_error", step = step, error = %error);
}

pub fn emit_fault_cooldown(consecutive: u32, total: u64, cooldown_secs: u64) {
    warn!(
        event = "supervisor.cooldown",
        consecutive_faults = consecutive,
        total_faults = total,
        cooldown_secs = cooldown_secs,
    );
}

pub fn emit_reconnect(endpoint: &str, success: bool) {
    if success {
        info!(event = "supervisor.reconnect", endpoint = %endpoint, success = true);
    } else {
        warn!(event = "supervisor.reconnect", endpoint = %endpoint, success = false);
    }
}
