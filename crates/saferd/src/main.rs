//! saferd - SAFER workplace safety monitoring daemon
//!
//! Opens the serial link to the sensor board, then resolves the camera, and
//! runs monitoring cycles until SIGINT/SIGTERM. Every option can also be given
//! through a `SAFER_*` environment variable or a `.env` file.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use safer_core::{
    init_tracing, ConfigError, Devices, LinkConnector, MonitorConfig, Supervisor, SupervisorReport,
};
use safer_io::{
    CameraConfig, ClassifierConfig, CommandCamera, CommandSpeaker, OpenAiClassifier,
    SerialConfig, SerialConnector, DEFAULT_TTS_COMMAND,
};
use tracing::{error, info, warn, Level};

const GREETING: &str = "Avvio safer";

#[derive(Parser, Debug)]
#[command(name = "saferd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SAFER workplace safety monitor", long_about = None)]
struct Args {
    /// Serial device of the sensor board
    #[arg(long, env = "SAFER_PORT", default_value = "/dev/ttyAMA0")]
    port: String,

    #[arg(long, env = "SAFER_BAUD", default_value_t = 115_200)]
    baud: u32,

    /// Seconds between arming the sensors and sending the hold
    #[arg(long, env = "SAFER_SETTLE_SECS", default_value_t = 20)]
    settle_secs: u64,

    #[arg(long, env = "SAFER_POLL_INTERVAL_SECS", default_value_t = 1)]
    poll_interval_secs: u64,

    #[arg(long, env = "SAFER_MAX_POLLS", default_value_t = 60)]
    max_polls: u32,

    /// Wall-clock budget for a sensor reading
    #[arg(long, env = "SAFER_READ_BUDGET_SECS", default_value_t = 90)]
    read_budget_secs: u64,

    #[arg(long, env = "SAFER_CLASSIFY_TIMEOUT_SECS", default_value_t = 60)]
    classify_timeout_secs: u64,

    #[arg(long, env = "SAFER_SPEECH_TIMEOUT_SECS", default_value_t = 45)]
    speech_timeout_secs: u64,

    /// Pause after a faulted cycle
    #[arg(long, env = "SAFER_FAULT_COOLDOWN_SECS", default_value_t = 10)]
    fault_cooldown_secs: u64,

    /// Reopen the serial link after this many consecutive faults (0 = never)
    #[arg(long, env = "SAFER_RECONNECT_AFTER", default_value_t = 3)]
    reconnect_after: u32,

    /// Camera device; probed among /dev/video* when omitted
    #[arg(long, env = "SAFER_CAMERA_DEVICE")]
    camera_device: Option<String>,

    #[arg(long, env = "SAFER_CAMERA_MAX_INDEX", default_value_t = 10)]
    camera_max_index: u32,

    /// Keep a copy of every photo in this directory
    #[arg(long, env = "SAFER_PHOTO_DIR")]
    photo_dir: Option<PathBuf>,

    /// Classifier API key (falls back to OPENAI_API_KEY)
    #[arg(long, env = "SAFER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Classifier API base URL (falls back to OPENAI_BASE_URL)
    #[arg(long, env = "SAFER_API_BASE")]
    api_base: Option<String>,

    #[arg(long, env = "SAFER_MODEL", default_value = "gpt-5")]
    model: String,

    /// Text-to-speech command; the text is appended as last argument
    #[arg(long, env = "SAFER_TTS_COMMAND", default_value = DEFAULT_TTS_COMMAND)]
    tts_command: String,

    /// Skip the spoken startup announcement
    #[arg(long, env = "SAFER_NO_GREETING")]
    no_greeting: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "SAFER_JSON")]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, env = "SAFER_VERBOSE")]
    verbose: bool,
}

impl Args {
    fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let config = MonitorConfig {
            settle_secs: self.settle_secs,
            poll_interval_secs: self.poll_interval_secs,
            max_polls: self.max_polls,
            read_budget_secs: self.read_budget_secs,
            classify_timeout_secs: self.classify_timeout_secs,
            speech_timeout_secs: self.speech_timeout_secs,
            fault_cooldown_secs: self.fault_cooldown_secs,
            reconnect_after_faults: self.reconnect_after,
            ..MonitorConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.port.clone(),
            baud: self.baud,
            ..SerialConfig::default()
        }
    }

    fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera_device.clone(),
            max_index: self.camera_max_index,
            archive_dir: self.photo_dir.clone(),
            ..CameraConfig::default()
        }
    }

    /// Overlay the command line on `base` (normally read from OPENAI_*).
    ///
    /// A missing key is not fatal: the daemon still drives the sensors and
    /// each cycle reports the classification failure.
    fn classifier_config(&self, base: ClassifierConfig) -> ClassifierConfig {
        ClassifierConfig {
            api_key: self.api_key.clone().unwrap_or(base.api_key),
            base_url: self.api_base.clone().unwrap_or(base.base_url),
            model: self.model.clone(),
            ..base
        }
    }

    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.json, args.log_level());

    match run(args).await {
        Ok(report) => {
            info!(
                cycles = report.cycles,
                faults = report.faults,
                alarms = report.alarms,
                "saferd stopped"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<SupervisorReport> {
    info!(version = safer_core::VERSION, port = %args.port, "saferd starting");

    // Listen from the start so an interrupt during setup still stops cleanly.
    let (trigger, mut shutdown) = safer_core::shutdown::channel();
    tokio::spawn(async move {
        wait_for_interrupt().await;
        info!("interrupt received");
        trigger.trigger();
    });

    let config = args.monitor_config().context("invalid monitor settings")?;
    let classifier_config = args.classifier_config(ClassifierConfig::from_env());
    let speaker = CommandSpeaker::new(&args.tts_command).context("invalid --tts-command")?;

    let connector = Arc::new(SerialConnector::new(args.serial_config()));
    let link = connector
        .connect()
        .await
        .context("cannot open sensor link")?;

    let camera_config = args.camera_config();
    let camera = match shutdown.guard(CommandCamera::probe(&camera_config)).await {
        Some(Ok(camera)) => camera,
        probed => {
            // Captures will fail per cycle; the link is the only hard requirement.
            if let Some(Err(e)) = probed {
                warn!(error = %e, "no camera found; falling back to /dev/video0");
            }
            CommandCamera::new(&camera_config, "/dev/video0").context("invalid camera command")?
        }
    };

    let devices = Devices {
        camera: Arc::new(camera),
        classifier: Arc::new(
            OpenAiClassifier::new(classifier_config).context("failed to build HTTP client")?,
        ),
        actuator: Arc::new(speaker),
    };

    let supervisor = Supervisor::from_link(config, connector, link, devices)
        .context("invalid monitor settings")?;
    info!(session_id = %supervisor.session_id(), "monitoring session started");

    if !args.no_greeting {
        shutdown.guard(supervisor.announce(GREETING)).await;
    }

    Ok(supervisor.run(shutdown).await)
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
