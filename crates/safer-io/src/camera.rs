//! Still capture through an external grabber program.
//!
//! The default command is `fswebcam` writing a JPEG to stdout. The device is
//! resolved once at startup by [`CommandCamera::probe`]; captures after that
//! always use the same device.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use safer_core::{CaptureArtifact, CaptureDevice, CaptureError, CaptureResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::process::{self, CommandLine};

/// Placeholder replaced by the device path in the capture command.
pub const DEVICE_PLACEHOLDER: &str = "{device}";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Capture command; `{device}` is substituted, JPEG bytes are read from stdout
    pub command: Vec<String>,
    /// Fixed device; skips probing when set
    pub device: Option<String>,
    /// Probe `/dev/video0` up to (excluding) this index
    pub max_index: u32,
    pub timeout_secs: u64,
    /// Keep a copy of every capture here
    pub archive_dir: Option<PathBuf>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            command: [
                "fswebcam",
                "--no-banner",
                "-r",
                "1920x1080",
                "--jpeg",
                "95",
                "-d",
                DEVICE_PLACEHOLDER,
                "-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            device: None,
            max_index: 10,
            timeout_secs: 15,
            archive_dir: None,
        }
    }
}

pub struct CommandCamera {
    command: CommandLine,
    device: String,
    timeout: Duration,
    archive_dir: Option<PathBuf>,
}

impl CommandCamera {
    /// Build a camera bound to `device` without probing.
    pub fn new(config: &CameraConfig, device: impl Into<String>) -> CaptureResult<Self> {
        let device = device.into();
        let mut words = config
            .command
            .iter()
            .map(|w| w.replace(DEVICE_PLACEHOLDER, &device));
        let program = words
            .next()
            .ok_or_else(|| CaptureError::DeviceUnavailable("capture command is empty".into()))?;
        let command = CommandLine {
            program,
            args: words.collect(),
        };

        Ok(Self {
            command,
            device,
            timeout: Duration::from_secs(config.timeout_secs),
            archive_dir: config.archive_dir.clone(),
        })
    }

    /// Resolve the capture device once.
    ///
    /// An explicitly configured device is used as is. Otherwise each
    /// `/dev/videoN` that exists is tried in order and the first one that
    /// yields a non-empty frame wins.
    pub async fn probe(config: &CameraConfig) -> CaptureResult<Self> {
        if let Some(device) = &config.device {
            info!(device = %device, "using configured camera");
            return Self::new(config, device.clone());
        }

        for index in 0..config.max_index {
            let device = format!("/dev/video{index}");
            if !Path::new(&device).exists() {
                continue;
            }
            let camera = Self::new(config, device.clone())?;
            match camera.grab().await {
                Ok(frame) if !frame.is_empty() => {
                    info!(device = %device, "camera found");
                    return Ok(camera);
                }
                Ok(_) => debug!(device = %device, "camera returned an empty frame"),
                Err(e) => debug!(device = %device, error = %e, "camera probe failed"),
            }
        }

        Err(CaptureError::DeviceUnavailable(format!(
            "no working camera among /dev/video0..{}",
            config.max_index
        )))
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    async fn grab(&self) -> CaptureResult<Vec<u8>> {
        let output = process::run(&self.command, Some(self.timeout)).await?;
        Ok(output.stdout)
    }

    async fn archive(&self, dir: &Path, artifact: &CaptureArtifact) {
        let path = dir.join(archive_name(artifact));
        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, artifact.bytes()).await
        }
        .await;
        match result {
            Ok(()) => debug!(path = %path.display(), "photo archived"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to archive photo"),
        }
    }
}

/// `workplace_<timestamp>.jpeg`, using the capture time.
pub fn archive_name(artifact: &CaptureArtifact) -> String {
    format!(
        "workplace_{}.jpeg",
        artifact.timestamp().format("%Y%m%d_%H%M%S")
    )
}

#[async_trait]
impl CaptureDevice for CommandCamera {
    async fn capture(&self) -> CaptureResult<CaptureArtifact> {
        let frame = self.grab().await?;
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }
        let artifact = CaptureArtifact::new(frame);
        if let Some(dir) = &self.archive_dir {
            self.archive(dir, &artifact).await;
        }
        Ok(artifact)
    }
}
