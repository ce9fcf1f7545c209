//! Cycle state machine states.

use serde::{Deserialize, Serialize};

/// State of the monitoring cycle.
///
/// A cycle occupies exactly one state at a time. Transitions only move
/// forward through the list below; `Faulted` is reachable from any state and
/// both terminal states lead back to `Idle` once cleanup has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    SensorsArming,
    AwaitingReading,
    CaptureInFlight,
    Classifying,
    ActuatingAlarm,
    CycleComplete,
    Faulted,
}

impl CycleState {
    /// Stable name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::SensorsArming => "sensors_arming",
            CycleState::AwaitingReading => "awaiting_reading",
            CycleState::CaptureInFlight => "capture_in_flight",
            CycleState::Classifying => "classifying",
            CycleState::ActuatingAlarm => "actuating_alarm",
            CycleState::CycleComplete => "cycle_complete",
            CycleState::Faulted => "faulted",
        }
    }

    /// Whether the cycle has ended in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleState::CycleComplete | CycleState::Faulted)
    }

    fn rank(&self) -> u8 {
        match self {
            CycleState::Idle => 0,
            CycleState::SensorsArming => 1,
            CycleState::AwaitingReading => 2,
            CycleState::CaptureInFlight => 3,
            CycleState::Classifying => 4,
            CycleState::ActuatingAlarm => 5,
            CycleState::CycleComplete => 6,
            CycleState::Faulted => 7,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(&self, next: CycleState) -> bool {
        if self.is_terminal() {
            return next == CycleState::Idle;
        }
        next == CycleState::Faulted || next.rank() > self.rank()
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
