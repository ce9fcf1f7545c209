//! Serial link to the sensor microcontroller.
//!
//! The tty is configured with `stty` and then opened as a plain file. A
//! dedicated reader thread reads newline-delimited output, logs every line
//! and forwards non-empty ones into a bounded channel that
//! [`SerialLink::poll`] drains without blocking. Writes go through a single
//! async mutex.
//!
//! The reader lives on its own OS thread rather than the runtime's blocking
//! pool, so a read parked in the kernel never holds up runtime shutdown. The
//! tty is put in `min 0 time 10` mode, so reads return at least once a
//! second and the thread notices [`SerialLink::close`] promptly. Bytes that
//! are not valid UTF-8 (boot noise, baud mismatch) are replaced, not fatal.

use std::io::{BufRead, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use safer_core::{LinkCommand, LinkConnector, LinkError, LinkResult, TransportLink};
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::unavailable;
use crate::process::{self, CommandLine};

const STTY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a read that returned nothing (end of a plain file).
const READ_IDLE: Duration = Duration::from_millis(100);

/// Command words understood by the sensor firmware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSet {
    pub arm: String,
    pub hold: String,
    pub alarm: String,
    pub stop: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            arm: "START".to_string(),
            hold: "PHOTO".to_string(),
            alarm: "WARNING".to_string(),
            stop: "STOP".to_string(),
        }
    }
}

impl CommandSet {
    /// The word written for `command`.
    pub fn encode(&self, command: LinkCommand) -> &str {
        match command {
            LinkCommand::Arm => &self.arm,
            LinkCommand::Hold => &self.hold,
            LinkCommand::Alarm => &self.alarm,
            LinkCommand::Stop => &self.stop,
        }
    }
}

/// Serial port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyAMA0`
    pub port: String,
    /// Line speed
    pub baud: u32,
    /// Lines buffered between the reader task and `poll`
    pub buffer_lines: usize,
    /// Run `stty` before opening; disable for pseudo-terminals and files
    pub configure_tty: bool,
    pub commands: CommandSet,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyAMA0".to_string(),
            baud: 115_200,
            buffer_lines: 64,
            configure_tty: true,
            commands: CommandSet::default(),
        }
    }
}

/// Opens [`SerialLink`]s on the configured port.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    async fn configure(&self) -> LinkResult<()> {
        let stty = CommandLine::new("stty")
            .arg("-F")
            .arg(&self.config.port)
            .arg(self.config.baud.to_string())
            .arg("raw")
            .arg("-echo")
            .arg("min")
            .arg("0")
            .arg("time")
            .arg("10");
        process::run(&stty, Some(STTY_TIMEOUT))
            .await
            .map_err(|e| unavailable(&self.config.port, e))?;
        Ok(())
    }
}

#[async_trait]
impl LinkConnector for SerialConnector {
    async fn connect(&self) -> LinkResult<Arc<dyn TransportLink>> {
        let port = &self.config.port;
        if self.config.configure_tty {
            self.configure().await?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(port)
            .await
            .map_err(|e| unavailable(port, e))?;
        let reader = file
            .try_clone()
            .await
            .map_err(|e| unavailable(port, e))?
            .into_std()
            .await;

        let (tx, rx) = mpsc::channel(self.config.buffer_lines.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        std::thread::Builder::new()
            .name("safer-serial-reader".to_string())
            .spawn({
                let port = port.clone();
                let stop = stop.clone();
                move || read_lines(&port, reader, &tx, &stop)
            })
            .map_err(|e| unavailable(port, e))?;

        info!(port = %port, baud = self.config.baud, "serial port opened");
        Ok(Arc::new(SerialLink {
            port: port.clone(),
            commands: self.config.commands.clone(),
            writer: Mutex::new(Some(file)),
            lines: Mutex::new(rx),
            stop,
        }))
    }

    fn endpoint(&self) -> String {
        format!("{}@{}", self.config.port, self.config.baud)
    }
}

/// Decode one line of MCU output, replacing invalid UTF-8.
pub fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Diagnostic reader: log each line, forward the non-empty ones.
///
/// Runs until `stop` is set, the link is dropped, or the device errors.
/// Returning drops `tx`, which `poll` reports as a lost link.
fn read_lines(port: &str, file: std::fs::File, tx: &mpsc::Sender<String>, stop: &AtomicBool) {
    let mut reader = std::io::BufReader::new(file);
    let mut buf = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => std::thread::sleep(READ_IDLE),
            // Read timed out mid-line; keep the partial line.
            Ok(_) if buf.last() != Some(&b'\n') => {}
            Ok(_) => {
                let line = decode_line(&buf);
                buf.clear();
                debug!(port = %port, line = %line, "mcu");
                if line.is_empty() {
                    continue;
                }
                match tx.try_send(line) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(line)) => {
                        warn!(port = %port, line = %line, "serial buffer full; line dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(port = %port, error = %e, "serial read failed");
                break;
            }
        }
    }
    debug!(port = %port, "serial reader stopped");
}

/// An open serial connection.
pub struct SerialLink {
    port: String,
    commands: CommandSet,
    writer: Mutex<Option<File>>,
    lines: Mutex<mpsc::Receiver<String>>,
    stop: Arc<AtomicBool>,
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl SerialLink {
    pub fn port(&self) -> &str {
        &self.port
    }
}

#[async_trait]
impl TransportLink for SerialLink {
    async fn send(&self, command: LinkCommand) -> LinkResult<()> {
        let word = self.commands.encode(command);
        let mut writer = self.writer.lock().await;
        let file = writer.as_mut().ok_or(LinkError::Closed)?;

        let write_err = |e: std::io::Error| LinkError::Write {
            command: word.to_string(),
            reason: e.to_string(),
        };
        file.write_all(format!("{word}\n").as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        debug!(port = %self.port, command = word, "serial write");
        Ok(())
    }

    async fn poll(&self) -> LinkResult<Option<String>> {
        let mut lines = self.lines.lock().await;
        match lines.try_recv() {
            Ok(line) => Ok(Some(line)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                if self.writer.lock().await.is_none() {
                    Err(LinkError::Closed)
                } else {
                    Err(LinkError::Disconnected(format!(
                        "reader for {} stopped",
                        self.port
                    )))
                }
            }
        }
    }

    async fn close(&self) -> LinkResult<()> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(mut file) = self.writer.lock().await.take() {
            file.flush().await?;
            info!(port = %self.port, "serial port closed");
        }
        Ok(())
    }
}
