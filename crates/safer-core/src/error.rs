//! Error taxonomy for the monitoring core.
//!
//! Each collaborator boundary has its own error type so the cycle controller
//! can map failures onto cycle outcomes without inspecting messages.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the transport link to the sensor microcontroller.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The link could not be opened.
    #[error("link unavailable on {port}: {reason}")]
    Unavailable { port: String, reason: String },

    /// A command could not be written.
    #[error("link write failed for {command}: {reason}")]
    Write { command: String, reason: String },

    /// Reading pending output failed.
    #[error("link read failed: {0}")]
    Read(String),

    /// The device stopped producing input (unplugged, read error).
    #[error("link disconnected: {0}")]
    Disconnected(String),

    /// The link was already closed.
    #[error("link closed")]
    Closed,

    /// IO error
    #[error("link io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Whether the link is unusable until reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkError::Disconnected(_) | LinkError::Closed)
    }
}

/// Errors raised by the capture subsystem.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera returned an empty frame")]
    EmptyFrame,

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("capture io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the risk classifier.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by the speech actuator.
#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("speech command failed: {0}")]
    Command(String),

    #[error("speech playback timed out after {0:?}")]
    Timeout(Duration),

    #[error("speech io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid monitor configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is required")]
    Missing { field: &'static str },
}

/// Top-level errors surfaced outside the cycle loop.
#[derive(Error, Debug)]
pub enum SaferError {
    #[error("transport link: {0}")]
    Link(#[from] LinkError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for SAFER core operations.
pub type Result<T> = std::result::Result<T, SaferError>;

/// Result type for link operations.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Result type for capture operations.
pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Result type for classifier operations.
pub type ClassifierResult<T> = std::result::Result<T, ClassifierError>;

/// Result type for actuator operations.
pub type ActuatorResult<T> = std::result::Result<T, ActuatorError>;
