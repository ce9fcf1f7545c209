//! SAFER Core Library
//!
//! The monitoring control loop of the SAFER workplace safety monitor:
//! - `controller`: the per-cycle state machine (arm, settle, read, capture,
//!   classify, actuate)
//! - `supervisor`: fault isolation, cooldown and shutdown around it
//! - `ports`: traits for the serial link, camera, classifier and speaker
//! - `fakes`: in-memory implementations of those traits for tests

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod ports;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;

pub use config::MonitorConfig;
pub use controller::{CycleController, Devices};
pub use domain::{
    is_structured_reading, ActuationReport, CaptureArtifact, ClassificationResult, CycleOutcome,
    CycleState, CycleStatus, ReadingField, RiskLevel, SensorReading,
};
pub use error::{
    ActuatorError, ActuatorResult, CaptureError, CaptureResult, ClassifierError,
    ClassifierResult, ConfigError, LinkError, LinkResult, Result, SaferError,
};
pub use metrics::Metrics;
pub use obs::CycleSpan;
pub use ports::{Actuator, CaptureDevice, LinkCommand, LinkConnector, RiskClassifier, TransportLink};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use supervisor::{Supervisor, SupervisorReport};
pub use telemetry::init_tracing;

/// SAFER version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
