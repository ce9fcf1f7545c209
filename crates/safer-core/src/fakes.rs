//! In-memory fakes for the collaborator traits (testing only)
//!
//! Each fake records how it was called so tests can assert call counts and
//! command order without hardware.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{CaptureArtifact, SensorReading};
use crate::error::{
    ActuatorError, ActuatorResult, CaptureError, CaptureResult, ClassifierError,
    ClassifierResult, LinkError, LinkResult,
};
use crate::ports::{Actuator, CaptureDevice, LinkCommand, LinkConnector, RiskClassifier, TransportLink};

// ---------------------------------------------------------------------------
// MemoryLink
// ---------------------------------------------------------------------------

/// Scripted transport link.
///
/// Polls pop from a script of `Some(line)` / `None` (nothing pending); an
/// exhausted script keeps answering `None`. Writes are recorded in order.
#[derive(Debug, Default)]
pub struct MemoryLink {
    script: Mutex<VecDeque<Option<String>>>,
    sent: Mutex<Vec<LinkCommand>>,
    failing: Mutex<HashSet<LinkCommand>>,
    polls: AtomicUsize,
    closed: AtomicBool,
    disconnected: AtomicBool,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line of MCU output.
    pub fn push_line(&self, line: impl Into<String>) -> &Self {
        self.script.lock().unwrap().push_back(Some(line.into()));
        self
    }

    /// Queue `count` empty polls.
    pub fn push_silence(&self, count: usize) -> &Self {
        let mut script = self.script.lock().unwrap();
        for _ in 0..count {
            script.push_back(None);
        }
        self
    }

    /// Make every write of `command` fail.
    pub fn fail_command(&self, command: LinkCommand) -> &Self {
        self.failing.lock().unwrap().insert(command);
        self
    }

    /// Let writes of `command` succeed again.
    pub fn heal_command(&self, command: LinkCommand) -> &Self {
        self.failing.lock().unwrap().remove(&command);
        self
    }

    /// Make every later poll report a lost device, until reconnected.
    pub fn disconnect(&self) -> &Self {
        self.disconnected.store(true, Ordering::SeqCst);
        self
    }

    /// Every command written, including failed attempts, in order.
    pub fn sent(&self) -> Vec<LinkCommand> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, command: LinkCommand) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == command)
            .count()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportLink for MemoryLink {
    async fn send(&self, command: LinkCommand) -> LinkResult<()> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        self.sent.lock().unwrap().push(command);
        if self.failing.lock().unwrap().contains(&command) {
            return Err(LinkError::Write {
                command: command.name().to_string(),
                reason: "simulated write failure".to_string(),
            });
        }
        Ok(())
    }

    async fn poll(&self) -> LinkResult<Option<String>> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(LinkError::Disconnected("simulated reader loss".to_string()));
        }
        Ok(self.script.lock().unwrap().pop_front().flatten())
    }

    async fn close(&self) -> LinkResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryConnector
// ---------------------------------------------------------------------------

/// Connector handing out a shared `MemoryLink`, or failing on demand.
#[derive(Debug)]
pub struct MemoryConnector {
    link: Arc<MemoryLink>,
    available: AtomicBool,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(link: Arc<MemoryLink>) -> Self {
        Self {
            link,
            available: AtomicBool::new(true),
            connects: AtomicUsize::new(0),
        }
    }

    /// A connector whose device is missing.
    pub fn unavailable() -> Self {
        let connector = Self::new(Arc::new(MemoryLink::new()));
        connector.set_available(false);
        connector
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkConnector for MemoryConnector {
    async fn connect(&self) -> LinkResult<Arc<dyn TransportLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(LinkError::Unavailable {
                port: self.endpoint(),
                reason: "simulated missing device".to_string(),
            });
        }
        self.link.closed.store(false, Ordering::SeqCst);
        self.link.disconnected.store(false, Ordering::SeqCst);
        Ok(self.link.clone())
    }

    fn endpoint(&self) -> String {
        "memory://mcu".to_string()
    }
}

// ---------------------------------------------------------------------------
// FakeCamera
// ---------------------------------------------------------------------------

/// Camera returning a fixed frame, or failing when told to.
#[derive(Debug, Default)]
pub struct FakeCamera {
    failing: AtomicBool,
    stall: Option<Duration>,
    captures: AtomicUsize,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let camera = Self::new();
        camera.failing.store(true, Ordering::SeqCst);
        camera
    }

    /// A camera that takes `delay` to produce each frame.
    pub fn stalling(delay: Duration) -> Self {
        Self {
            stall: Some(delay),
            ..Self::default()
        }
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn capture(&self) -> CaptureResult<CaptureArtifact> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stall {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CaptureError::EmptyFrame);
        }
        Ok(CaptureArtifact::new(vec![0xff, 0xd8, 0xff, 0xe0, 0xff, 0xd9]))
    }
}

// ---------------------------------------------------------------------------
// FakeClassifier
// ---------------------------------------------------------------------------

/// How the fake classifier answers.
#[derive(Debug, Clone)]
pub enum ClassifierScript {
    Respond(String),
    Fail(String),
    /// Never answers within the given time.
    Stall(Duration),
}

/// Classifier answering from a fixed script and recording its inputs.
#[derive(Debug)]
pub struct FakeClassifier {
    script: Mutex<ClassifierScript>,
    calls: AtomicUsize,
    readings: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn responding(response: impl Into<String>) -> Self {
        Self::scripted(ClassifierScript::Respond(response.into()))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::scripted(ClassifierScript::Fail(reason.into()))
    }

    pub fn stalling(delay: Duration) -> Self {
        Self::scripted(ClassifierScript::Stall(delay))
    }

    pub fn scripted(script: ClassifierScript) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            readings: Mutex::new(Vec::new()),
        }
    }

    pub fn set_script(&self, script: ClassifierScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raw readings passed to `classify`, in call order.
    pub fn readings(&self) -> Vec<String> {
        self.readings.lock().unwrap().clone()
    }
}

#[async_trait]
impl RiskClassifier for FakeClassifier {
    async fn classify(
        &self,
        _image: &CaptureArtifact,
        reading: &SensorReading,
    ) -> ClassifierResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.readings.lock().unwrap().push(reading.raw.clone());
        let script = self.script.lock().unwrap().clone();
        match script {
            ClassifierScript::Respond(text) => Ok(text),
            ClassifierScript::Fail(reason) => Err(ClassifierError::Request(reason)),
            ClassifierScript::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Err(ClassifierError::Request("stalled call returned late".to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FakeActuator
// ---------------------------------------------------------------------------

/// Speaker that records what it was asked to say.
#[derive(Debug, Default)]
pub struct FakeActuator {
    spoken: Mutex<Vec<String>>,
    failing: AtomicBool,
    playback: Option<Duration>,
    finished: AtomicUsize,
}

impl FakeActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let actuator = Self::new();
        actuator.failing.store(true, Ordering::SeqCst);
        actuator
    }

    /// A speaker whose playback lasts `playback`.
    pub fn slow(playback: Duration) -> Self {
        Self {
            playback: Some(playback),
            ..Self::default()
        }
    }

    /// Announcements that played to the end.
    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn speak_count(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }
}

#[async_trait]
impl Actuator for FakeActuator {
    async fn speak(&self, text: &str) -> ActuatorResult<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if let Some(playback) = self.playback {
            tokio::time::sleep(playback).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ActuatorError::Command("simulated audio failure".to_string()));
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
