//! Domain model for the monitoring cycle.

pub mod artifact;
pub mod outcome;
pub mod reading;
pub mod risk;
pub mod state;

pub use artifact::CaptureArtifact;
pub use outcome::{ActuationReport, CycleOutcome, CycleStatus};
pub use reading::{is_structured_reading, ReadingField, SensorReading};
pub use risk::{ClassificationResult, RiskLevel};
pub use state::CycleState;
