//! Collaborator traits at the edge of the monitoring core.
//!
//! - `TransportLink` / `LinkConnector`: the serial channel to the sensor MCU
//! - `CaptureDevice`: still image acquisition
//! - `RiskClassifier`: remote vision-language risk assessment
//! - `Actuator`: speech playback
//!
//! All traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CaptureArtifact, SensorReading};
use crate::error::{ActuatorResult, CaptureResult, ClassifierResult, LinkResult};

/// Commands the core sends to the sensor MCU.
///
/// The wire encoding of each command is a deployment detail owned by the
/// link implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkCommand {
    /// Activate the sensors for a new cycle.
    Arm,
    /// End sensor activity for the cycle and report a sample.
    Hold,
    /// Drive the physical alarm.
    Alarm,
    /// Final stop on shutdown.
    Stop,
}

impl LinkCommand {
    pub fn name(&self) -> &'static str {
        match self {
            LinkCommand::Arm => "arm",
            LinkCommand::Hold => "hold",
            LinkCommand::Alarm => "alarm",
            LinkCommand::Stop => "stop",
        }
    }
}

impl std::fmt::Display for LinkCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte-stream channel to the sensor microcontroller.
///
/// Guarantees expected by the core:
/// - `send` writes are serialized; concurrent callers never interleave.
/// - `poll` never blocks waiting for data: `Ok(None)` means nothing pending.
#[async_trait]
pub trait TransportLink: Send + Sync {
    /// Write one command.
    async fn send(&self, command: LinkCommand) -> LinkResult<()>;

    /// Take the next pending line of output, if any.
    async fn poll(&self) -> LinkResult<Option<String>>;

    /// Release the underlying device.
    async fn close(&self) -> LinkResult<()>;
}

/// Opens transport links. Used once at startup and again on reconnect.
#[async_trait]
pub trait LinkConnector: Send + Sync {
    async fn connect(&self) -> LinkResult<Arc<dyn TransportLink>>;

    /// Human-readable endpoint (e.g. the serial port) for log lines.
    fn endpoint(&self) -> String;
}

/// Still image acquisition from the configured camera.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture(&self) -> CaptureResult<CaptureArtifact>;
}

/// Remote risk assessment. Returns the classifier's raw text.
///
/// Implementations need not bound their own latency; the controller wraps
/// every call in its own timeout.
#[async_trait]
pub trait RiskClassifier: Send + Sync {
    async fn classify(
        &self,
        image: &CaptureArtifact,
        reading: &SensorReading,
    ) -> ClassifierResult<String>;
}

/// Speech playback. `speak` returns once playback has finished.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn speak(&self, text: &str) -> ActuatorResult<()>;
}
