//! Terminal record of one monitoring cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::SensorReading;
use super::risk::ClassificationResult;
use super::state::CycleState;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatus {
    /// A classification was obtained (whatever its level).
    Classified,
    /// The read budget expired without a qualifying reading.
    NoReading,
    CaptureFailed { reason: String },
    ClassificationFailed { reason: String },
    /// Shutdown was requested at a checkpoint.
    Cancelled,
    /// The transport link was unusable.
    Faulted { reason: String },
}

impl CycleStatus {
    pub fn name(&self) -> &'static str {
        match self {
            CycleStatus::Classified => "classified",
            CycleStatus::NoReading => "no_reading",
            CycleStatus::CaptureFailed { .. } => "capture_failed",
            CycleStatus::ClassificationFailed { .. } => "classification_failed",
            CycleStatus::Cancelled => "cancelled",
            CycleStatus::Faulted { .. } => "faulted",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, CycleStatus::Faulted { .. })
    }
}

/// What the actuation step did. Failures are recorded, never propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuationReport {
    pub alarm_signalled: bool,
    pub spoken: bool,
    pub errors: Vec<String>,
}

impl ActuationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Audit record of one cycle, kept for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub cycle_id: u64,
    /// `CycleComplete` or `Faulted`.
    pub final_state: CycleState,
    pub status: CycleStatus,
    pub reading: Option<SensorReading>,
    pub classification: Option<ClassificationResult>,
    pub actuation: Option<ActuationReport>,
    /// Short digest of the image classified this cycle, if any.
    pub image_digest: Option<String>,
    /// Every state the cycle visited, in order, starting with `Idle`.
    pub trail: Vec<CycleState>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CycleOutcome {
    pub fn is_fault(&self) -> bool {
        self.status.is_fault()
    }

    /// Whether the alarm path ran this cycle.
    pub fn actuated(&self) -> bool {
        self.actuation.is_some()
    }
}
