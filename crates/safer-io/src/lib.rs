//! SAFER hardware and network adapters
//!
//! Concrete implementations of the `safer-core` collaborator traits:
//! - `serial`: the sensor microcontroller link over a tty
//! - `camera`: still capture through `fswebcam` (or another grabber)
//! - `classifier`: the hosted vision-language risk classifier
//! - `speech`: spoken announcements through a TTS program

pub mod camera;
pub mod classifier;
pub mod error;
pub mod process;
pub mod serial;
pub mod speech;

pub use camera::{CameraConfig, CommandCamera};
pub use classifier::{ClassifierConfig, OpenAiClassifier};
pub use error::CommandError;
pub use process::CommandLine;
pub use serial::{CommandSet, SerialConfig, SerialConnector, SerialLink};
pub use speech::{CommandSpeaker, DEFAULT_TTS_COMMAND};
