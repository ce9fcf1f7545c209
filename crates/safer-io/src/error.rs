//! Error types for the hardware and network adapters

use std::time::Duration;

use safer_core::{ActuatorError, CaptureError, ClassifierError, LinkError};
use thiserror::Error;

/// Failure running an external helper program (stty, fswebcam, espeak-ng).
#[derive(Error, Debug)]
pub enum CommandError {
    /// No program was configured
    #[error("command line is empty")]
    Empty,

    /// The program could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program did not exit in time and was killed
    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    /// The program exited unsuccessfully
    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// IO error while collecting output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CommandError> for CaptureError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Timeout { after, .. } => CaptureError::Timeout(after),
            CommandError::Io(e) => CaptureError::Io(e),
            other => CaptureError::DeviceUnavailable(other.to_string()),
        }
    }
}

impl From<CommandError> for ActuatorError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Timeout { after, .. } => ActuatorError::Timeout(after),
            CommandError::Io(e) => ActuatorError::Io(e),
            other => ActuatorError::Command(other.to_string()),
        }
    }
}

/// Convert a reqwest failure into a classifier request error.
pub(crate) fn request_error(err: reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Request(format!("request timed out: {err}"))
    } else {
        ClassifierError::Request(err.to_string())
    }
}

/// Map a tty configuration or open failure onto the link taxonomy.
pub(crate) fn unavailable(port: &str, reason: impl ToString) -> LinkError {
    LinkError::Unavailable {
        port: port.to_string(),
        reason: reason.to_string(),
    }
}
