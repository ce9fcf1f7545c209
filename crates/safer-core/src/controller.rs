//! The monitoring cycle state machine.
//!
//! One call to [`CycleController::run_one_cycle`] walks
//! `Idle → SensorsArming → AwaitingReading → CaptureInFlight → Classifying
//! → ActuatingAlarm → CycleComplete`, leaving early to `CycleComplete` for
//! expected outcomes (no reading, capture or classifier failure) and to
//! `Faulted` when the link cannot be written or stops delivering input.
//! Every path ends with the hold command sent exactly once and the
//! controller back in `Idle`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{info, warn, Instrument};

use crate::config::MonitorConfig;
use crate::domain::{
    ActuationReport, ClassificationResult, CycleOutcome, CycleState, CycleStatus, RiskLevel,
    SensorReading,
};
use crate::error::{ActuatorError, CaptureError, ClassifierError, LinkResult};
use crate::obs;
use crate::ports::{Actuator, CaptureDevice, LinkCommand, RiskClassifier, TransportLink};
use crate::shutdown::Shutdown;

/// Devices the controller drives besides the link.
#[derive(Clone)]
pub struct Devices {
    pub camera: Arc<dyn CaptureDevice>,
    pub classifier: Arc<dyn RiskClassifier>,
    pub actuator: Arc<dyn Actuator>,
}

/// Result of the `AwaitingReading` polling loop.
enum ReadOutcome {
    Reading(SensorReading, u32),
    Exhausted(u32),
    Cancelled,
    /// The link was lost while polling.
    LinkLost(String),
}

/// Mutable record of the cycle in progress.
struct CycleRun {
    id: u64,
    started_at: DateTime<Utc>,
    started: Instant,
    trail: Vec<CycleState>,
    hold_sent: bool,
    reading: Option<SensorReading>,
    classification: Option<ClassificationResult>,
    actuation: Option<ActuationReport>,
    image_digest: Option<String>,
}

impl CycleRun {
    fn start(id: u64) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            started: Instant::now(),
            trail: vec![CycleState::Idle],
            hold_sent: false,
            reading: None,
            classification: None,
            actuation: None,
            image_digest: None,
        }
    }

    fn finish(self, final_state: CycleState, status: CycleStatus) -> CycleOutcome {
        CycleOutcome {
            cycle_id: self.id,
            final_state,
            status,
            reading: self.reading,
            classification: self.classification,
            actuation: self.actuation,
            image_digest: self.image_digest,
            trail: self.trail,
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

/// Sequences one monitoring cycle at a time.
pub struct CycleController {
    config: MonitorConfig,
    link: Arc<dyn TransportLink>,
    devices: Devices,
    state: CycleState,
    next_cycle_id: u64,
}

impl CycleController {
    pub fn new(config: MonitorConfig, link: Arc<dyn TransportLink>, devices: Devices) -> Self {
        Self {
            config,
            link,
            devices,
            state: CycleState::Idle,
            next_cycle_id: 1,
        }
    }

    /// Current state. Always `Idle` between cycles.
    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn link(&self) -> Arc<dyn TransportLink> {
        self.link.clone()
    }

    /// Swap in a freshly opened link, returning the previous one.
    pub fn replace_link(&mut self, link: Arc<dyn TransportLink>) -> Arc<dyn TransportLink> {
        std::mem::replace(&mut self.link, link)
    }

    /// Run one full cycle and return its terminal record.
    ///
    /// Never fails: every per-cycle error is folded into the outcome status.
    /// Shutdown is observed while settling, between polls, during capture and
    /// during classification; actuation always runs to completion.
    pub async fn run_one_cycle(&mut self, shutdown: &Shutdown) -> CycleOutcome {
        let cycle_id = self.next_cycle_id;
        self.next_cycle_id += 1;

        let mut shutdown = shutdown.clone();
        self.drive(cycle_id, &mut shutdown)
            .instrument(obs::cycle_span(cycle_id))
            .await
    }

    async fn drive(&mut self, cycle_id: u64, shutdown: &mut Shutdown) -> CycleOutcome {
        obs::emit_cycle_started(cycle_id);
        let mut run = CycleRun::start(cycle_id);

        let status = self.sequence(&mut run, shutdown).await;

        let final_state = if status.is_fault() {
            CycleState::Faulted
        } else {
            CycleState::CycleComplete
        };
        self.transition(&mut run, final_state);

        if !run.hold_sent {
            run.hold_sent = true;
            if let Err(e) = self.send(LinkCommand::Hold).await {
                obs::emit_step_error("cleanup_hold", &e);
            }
        }

        let outcome = run.finish(final_state, status);
        obs::emit_cycle_finished(&outcome);

        obs::emit_state_changed(self.state, CycleState::Idle);
        self.state = CycleState::Idle;
        outcome
    }

    async fn sequence(&mut self, run: &mut CycleRun, shutdown: &mut Shutdown) -> CycleStatus {
        self.transition(run, CycleState::SensorsArming);
        if let Err(e) = self.send(LinkCommand::Arm).await {
            return CycleStatus::Faulted {
                reason: e.to_string(),
            };
        }

        if !shutdown.sleep(self.config.settle()).await {
            return CycleStatus::Cancelled;
        }

        self.transition(run, CycleState::AwaitingReading);
        run.hold_sent = true;
        if let Err(e) = self.send(LinkCommand::Hold).await {
            return CycleStatus::Faulted {
                reason: e.to_string(),
            };
        }

        let reading = match self.await_reading(shutdown).await {
            ReadOutcome::Reading(reading, polls) => {
                obs::emit_reading_accepted(&reading.raw, polls);
                reading
            }
            ReadOutcome::Exhausted(polls) => {
                info!(polls = polls, "no qualifying reading within budget");
                return CycleStatus::NoReading;
            }
            ReadOutcome::Cancelled => return CycleStatus::Cancelled,
            ReadOutcome::LinkLost(reason) => return CycleStatus::Faulted { reason },
        };
        run.reading = Some(reading.clone());

        self.transition(run, CycleState::CaptureInFlight);
        let artifact = match shutdown.guard(self.devices.camera.capture()).await {
            None => return CycleStatus::Cancelled,
            Some(Err(e)) => {
                warn!(error = %e, "capture failed");
                return CycleStatus::CaptureFailed {
                    reason: e.to_string(),
                };
            }
            Some(Ok(artifact)) if artifact.is_empty() => {
                let e = CaptureError::EmptyFrame;
                warn!(error = %e, "capture failed");
                return CycleStatus::CaptureFailed {
                    reason: e.to_string(),
                };
            }
            Some(Ok(artifact)) => artifact,
        };
        info!(
            bytes = artifact.len(),
            digest = artifact.short_digest(),
            "photo captured"
        );
        run.image_digest = Some(artifact.short_digest().to_string());

        self.transition(run, CycleState::Classifying);
        let limit = self.config.classify_timeout();
        let call = tokio::time::timeout(
            limit,
            self.devices.classifier.classify(&artifact, &reading),
        );
        let response = match shutdown.guard(call).await {
            None => return CycleStatus::Cancelled,
            Some(Err(_elapsed)) => {
                let e = ClassifierError::Timeout(limit);
                warn!(error = %e, "classification failed");
                return CycleStatus::ClassificationFailed {
                    reason: e.to_string(),
                };
            }
            Some(Ok(Err(e))) => {
                warn!(error = %e, "classification failed");
                return CycleStatus::ClassificationFailed {
                    reason: e.to_string(),
                };
            }
            Some(Ok(Ok(text))) => text,
        };
        drop(artifact);

        let result = ClassificationResult::parse(&response);
        info!(
            risk = %result.risk_level,
            narrative = %result.narrative,
            "safety analysis"
        );
        let alarm = result.warrants_alarm();
        let narrative = result.narrative.clone();
        if result.risk_level == RiskLevel::Unknown {
            warn!(response = %response, "classifier gave no recognizable risk level");
        }
        run.classification = Some(result);

        if !alarm {
            return CycleStatus::Classified;
        }

        self.transition(run, CycleState::ActuatingAlarm);
        run.actuation = Some(self.actuate(&narrative).await);
        CycleStatus::Classified
    }

    /// Poll the link until a qualifying reading arrives or the budget runs out.
    async fn await_reading(&self, shutdown: &mut Shutdown) -> ReadOutcome {
        let deadline = Instant::now() + self.config.read_budget();
        let interval = self.config.poll_interval();
        let mut polls = 0u32;

        while polls < self.config.max_polls {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            if !shutdown.sleep(interval.min(deadline - now)).await {
                return ReadOutcome::Cancelled;
            }

            polls += 1;
            match self.link.poll().await {
                Ok(None) => {}
                Ok(Some(payload)) => match SensorReading::parse(&payload) {
                    Some(reading) => return ReadOutcome::Reading(reading, polls),
                    None => obs::emit_reading_discarded(&payload),
                },
                Err(e) if e.is_fatal() => return ReadOutcome::LinkLost(e.to_string()),
                Err(e) => obs::emit_step_error("poll", &e),
            }
        }

        ReadOutcome::Exhausted(polls)
    }

    /// Raise the alarm and announce the narrative. Best-effort on both counts.
    async fn actuate(&self, narrative: &str) -> ActuationReport {
        let mut report = ActuationReport::default();

        match self.send(LinkCommand::Alarm).await {
            Ok(()) => report.alarm_signalled = true,
            Err(e) => {
                obs::emit_step_error("alarm", &e);
                report.errors.push(e.to_string());
            }
        }

        if narrative.is_empty() {
            warn!("risk reported without narrative; nothing to announce");
            return report;
        }

        match self.speak(narrative).await {
            Ok(()) => report.spoken = true,
            Err(e) => {
                obs::emit_step_error("speech", &e);
                report.errors.push(e.to_string());
            }
        }

        report
    }

    /// Speak through the actuator, bounded by the speech timeout.
    pub async fn speak(&self, text: &str) -> Result<(), ActuatorError> {
        let limit = self.config.speech_timeout();
        match tokio::time::timeout(limit, self.devices.actuator.speak(text)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ActuatorError::Timeout(limit)),
        }
    }

    async fn send(&self, command: LinkCommand) -> LinkResult<()> {
        self.link.send(command).await?;
        obs::emit_command_sent(command);
        Ok(())
    }

    fn transition(&mut self, run: &mut CycleRun, next: CycleState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        obs::emit_state_changed(self.state, next);
        self.state = next;
        run.trail.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeActuator, FakeCamera, FakeClassifier, MemoryLink};

    fn controller(
        link: Arc<MemoryLink>,
        classifier: Arc<FakeClassifier>,
    ) -> (CycleController, Arc<FakeCamera>, Arc<FakeActuator>) {
        let camera = Arc::new(FakeCamera::new());
        let actuator = Arc::new(FakeActuator::new());
        let devices = Devices {
            camera: camera.clone(),
            classifier,
            actuator: actuator.clone(),
        };
        let config = MonitorConfig {
            settle_secs: 2,
            poll_interval_secs: 1,
            max_polls: 5,
            read_budget_secs: 30,
            ..MonitorConfig::default()
        };
        (CycleController::new(config, link, devices), camera, actuator)
    }

    #[tokio::test(start_paused = true)]
    async fn low_risk_cycle_takes_no_action() {
        let link = Arc::new(MemoryLink::new());
        link.push_line("{temp:21,smoke:2,lux:400}");
        let classifier = Arc::new(FakeClassifier::responding("Ambiente nella norma. LOW"));
        let (mut ctl, camera, actuator) = controller(link.clone(), classifier.clone());

        let outcome = ctl.run_one_cycle(&Shutdown::never()).await;

        assert_eq!(outcome.status, CycleStatus::Classified);
        assert_eq!(outcome.final_state, CycleState::CycleComplete);
        assert_eq!(
            outcome.classification.as_ref().map(|c| c.risk_level),
            Some(RiskLevel::Low)
        );
        assert!(outcome.actuation.is_none());
        assert_eq!(camera.capture_count(), 1);
        assert_eq!(actuator.speak_count(), 0);
        assert_eq!(link.sent(), vec![LinkCommand::Arm, LinkCommand::Hold]);
        assert_eq!(ctl.state(), CycleState::Idle);
        assert_eq!(
            outcome.trail,
            vec![
                CycleState::Idle,
                CycleState::SensorsArming,
                CycleState::AwaitingReading,
                CycleState::CaptureInFlight,
                CycleState::Classifying,
                CycleState::CycleComplete,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn noise_is_skipped_until_structured_reading() {
        let link = Arc::new(MemoryLink::new());
        link.push_line("MCU ready")
            .push_silence(1)
            .push_line("{temp:24,smoke:1,lux:320}");
        let classifier = Arc::new(FakeClassifier::responding("Nessun problema. LOW"));
        let (mut ctl, _camera, _actuator) = controller(link.clone(), classifier.clone());

        let outcome = ctl.run_one_cycle(&Shutdown::never()).await;

        assert_eq!(link.poll_count(), 3);
        assert_eq!(
            outcome.reading.as_ref().map(|r| r.raw.as_str()),
            Some("{temp:24,smoke:1,lux:320}")
        );
        assert_eq!(classifier.readings(), vec!["{temp:24,smoke:1,lux:320}".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_ids_increase() {
        let link = Arc::new(MemoryLink::new());
        let classifier = Arc::new(FakeClassifier::responding("ok LOW"));
        let (mut ctl, _camera, _actuator) = controller(link, classifier);

        let first = ctl.run_one_cycle(&Shutdown::never()).await;
        let second = ctl.run_one_cycle(&Shutdown::never()).await;
        assert_eq!(first.cycle_id + 1, second.cycle_id);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_budget_honours_wall_clock() {
        let link = Arc::new(MemoryLink::new());
        let classifier = Arc::new(FakeClassifier::responding("ok LOW"));
        let (mut ctl, _camera, _actuator) = controller(link.clone(), classifier);
        ctl.config = MonitorConfig {
            settle_secs: 0,
            poll_interval_secs: 10,
            max_polls: 100,
            read_budget_secs: 25,
            ..MonitorConfig::default()
        };

        let outcome = ctl.run_one_cycle(&Shutdown::never()).await;

        assert_eq!(outcome.status, CycleStatus::NoReading);
        // Polls at 10s, 20s and the truncated wait ending at 25s.
        assert_eq!(link.poll_count(), 3);
    }
}
