//! Spoken announcements through a local text-to-speech program.

use async_trait::async_trait;
use safer_core::{Actuator, ActuatorResult};
use tracing::debug;

use crate::error::CommandError;
use crate::process::{self, CommandLine};

/// Default synthesizer: espeak-ng with the Italian voice.
pub const DEFAULT_TTS_COMMAND: &str = "espeak-ng -v it";

/// Speaks by running the configured command with the text as last argument.
///
/// Waits for the program to exit, so playback is finished when `speak`
/// returns. The timeout is imposed by the caller; dropping the future kills
/// the program.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    command: CommandLine,
}

impl CommandSpeaker {
    pub fn new(command_line: &str) -> Result<Self, CommandError> {
        Ok(Self {
            command: CommandLine::parse(command_line)?,
        })
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }
}

#[async_trait]
impl Actuator for CommandSpeaker {
    async fn speak(&self, text: &str) -> ActuatorResult<()> {
        let command = self.command.clone().arg(text);
        let output = process::run(&command, None).await?;
        debug!(
            program = %self.command.program,
            chars = text.chars().count(),
            duration_ms = output.duration_ms,
            "announcement played"
        );
        Ok(())
    }
}
