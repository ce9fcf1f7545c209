//! Cycle controller behaviour against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use safer_core::fakes::{FakeActuator, FakeCamera, FakeClassifier, MemoryLink};
use safer_core::shutdown;
use safer_core::{
    CycleController, CycleState, CycleStatus, Devices, LinkCommand, MonitorConfig, RiskLevel,
    Shutdown,
};

const READING: &str = "{temp:29,smoke:5,lux:250}";

struct Rig {
    link: Arc<MemoryLink>,
    camera: Arc<FakeCamera>,
    classifier: Arc<FakeClassifier>,
    actuator: Arc<FakeActuator>,
    controller: CycleController,
}

fn config() -> MonitorConfig {
    MonitorConfig {
        settle_secs: 20,
        poll_interval_secs: 1,
        max_polls: 10,
        read_budget_secs: 60,
        classify_timeout_secs: 30,
        speech_timeout_secs: 15,
        ..MonitorConfig::default()
    }
}

fn rig_with(camera: FakeCamera, classifier: FakeClassifier, actuator: FakeActuator) -> Rig {
    let link = Arc::new(MemoryLink::new());
    let camera = Arc::new(camera);
    let classifier = Arc::new(classifier);
    let actuator = Arc::new(actuator);
    let devices = Devices {
        camera: camera.clone(),
        classifier: classifier.clone(),
        actuator: actuator.clone(),
    };
    let controller = CycleController::new(config(), link.clone(), devices);
    Rig {
        link,
        camera,
        classifier,
        actuator,
        controller,
    }
}

fn rig(classifier: FakeClassifier) -> Rig {
    rig_with(FakeCamera::new(), classifier, FakeActuator::new())
}

/// Scenario: a hot room with a HIGH verdict raises the alarm and speaks.
#[tokio::test(start_paused = true)]
async fn high_risk_reading_raises_alarm_and_speaks_narrative() {
    let mut rig = rig(FakeClassifier::responding(
        "Temperatura elevata, ventilare l'ambiente. HIGH",
    ));
    rig.link.push_silence(2).push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    let result = outcome.classification.clone().expect("classified");
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.narrative, "Temperatura elevata, ventilare l'ambiente.");

    assert_eq!(
        rig.link.sent(),
        vec![LinkCommand::Arm, LinkCommand::Hold, LinkCommand::Alarm]
    );
    assert_eq!(
        rig.actuator.spoken(),
        vec!["Temperatura elevata, ventilare l'ambiente.".to_string()]
    );
    assert_eq!(rig.classifier.readings(), vec![READING.to_string()]);

    let report = outcome.actuation.clone().expect("actuated");
    assert!(report.alarm_signalled);
    assert!(report.spoken);
    assert!(report.is_clean());

    assert_eq!(outcome.status, CycleStatus::Classified);
    assert_eq!(outcome.final_state, CycleState::CycleComplete);
    assert!(outcome.trail.contains(&CycleState::ActuatingAlarm));
    assert!(outcome.image_digest.is_some());
    assert_eq!(rig.controller.state(), CycleState::Idle);
}

/// Scenario: a response without a trailing level is UNKNOWN and silent.
#[tokio::test(start_paused = true)]
async fn unrecognized_verdict_is_unknown_without_actuation() {
    let mut rig = rig(FakeClassifier::responding("Nessun rischio rilevato"));
    rig.link.push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    let result = outcome.classification.clone().expect("classified");
    assert_eq!(result.risk_level, RiskLevel::Unknown);
    assert_eq!(result.narrative, "Nessun rischio rilevato");
    assert!(outcome.actuation.is_none());
    assert_eq!(rig.link.count(LinkCommand::Alarm), 0);
    assert_eq!(rig.actuator.speak_count(), 0);
    assert_eq!(outcome.status, CycleStatus::Classified);
}

/// Actuation happens for exactly MEDIUM and HIGH across varied responses.
#[tokio::test(start_paused = true)]
async fn actuation_iff_medium_or_high() {
    let cases = [
        ("Tutto in ordine. LOW", false),
        ("Tutto in ordine. low", false),
        ("Luce scarsa, aumentare l'illuminazione. MEDIUM", true),
        ("Fumo oltre soglia. evacuare. high", true),
        ("Fumo oltre soglia HIGH.", false),
        ("MEDIUM rischio non concluso", false),
        ("", false),
        ("LOW MEDIUM", true),
        ("HIGH LOW", false),
        ("Risposta UNKNOWN", false),
    ];

    for (response, should_actuate) in cases {
        let mut rig = rig(FakeClassifier::responding(response));
        rig.link.push_line(READING);

        let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;
        let level = outcome
            .classification
            .as_ref()
            .map(|c| c.risk_level)
            .expect("classified");

        assert_eq!(outcome.actuated(), should_actuate, "{response:?}");
        assert_eq!(level.warrants_alarm(), should_actuate, "{response:?}");
        assert_eq!(
            rig.link.count(LinkCommand::Alarm),
            usize::from(should_actuate),
            "{response:?}"
        );
    }
}

/// Budget expiry: no capture and no classification, not a fault.
#[tokio::test(start_paused = true)]
async fn exhausted_budget_never_captures_or_classifies() {
    let mut rig = rig(FakeClassifier::responding("ok HIGH"));
    rig.link
        .push_line("sensor warming up")
        .push_silence(3)
        .push_line("{broken");

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert_eq!(outcome.status, CycleStatus::NoReading);
    assert_eq!(outcome.final_state, CycleState::CycleComplete);
    assert!(!outcome.is_fault());
    assert_eq!(rig.link.poll_count(), 10);
    assert_eq!(rig.camera.capture_count(), 0);
    assert_eq!(rig.classifier.call_count(), 0);
    assert_eq!(rig.actuator.speak_count(), 0);
    assert_eq!(rig.link.sent(), vec![LinkCommand::Arm, LinkCommand::Hold]);
}

/// Arm write failure: faulted, nothing downstream, hold still issued once.
#[tokio::test(start_paused = true)]
async fn arm_write_failure_faults_cycle() {
    let mut rig = rig(FakeClassifier::responding("ok HIGH"));
    rig.link.fail_command(LinkCommand::Arm).push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert!(outcome.is_fault());
    assert_eq!(outcome.final_state, CycleState::Faulted);
    assert_eq!(rig.camera.capture_count(), 0);
    assert_eq!(rig.classifier.call_count(), 0);
    assert_eq!(rig.link.poll_count(), 0);
    assert_eq!(rig.link.sent(), vec![LinkCommand::Arm, LinkCommand::Hold]);
    assert_eq!(
        outcome.trail,
        vec![CycleState::Idle, CycleState::SensorsArming, CycleState::Faulted]
    );
    assert_eq!(rig.controller.state(), CycleState::Idle);
}

/// A failed hold write faults the cycle and is not retried in cleanup.
#[tokio::test(start_paused = true)]
async fn hold_write_failure_is_not_retried() {
    let mut rig = rig(FakeClassifier::responding("ok HIGH"));
    rig.link.fail_command(LinkCommand::Hold).push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert!(outcome.is_fault());
    assert_eq!(rig.link.count(LinkCommand::Hold), 1);
    assert_eq!(rig.camera.capture_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn capture_failure_ends_cycle_before_classification() {
    let mut rig = rig_with(
        FakeCamera::failing(),
        FakeClassifier::responding("ok HIGH"),
        FakeActuator::new(),
    );
    rig.link.push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert!(matches!(outcome.status, CycleStatus::CaptureFailed { .. }));
    assert_eq!(outcome.final_state, CycleState::CycleComplete);
    assert_eq!(rig.camera.capture_count(), 1);
    assert_eq!(rig.classifier.call_count(), 0);
    assert_eq!(rig.link.count(LinkCommand::Alarm), 0);
    assert!(outcome.reading.is_some());
}

#[tokio::test(start_paused = true)]
async fn classifier_error_completes_without_actuation() {
    let mut rig = rig(FakeClassifier::failing("connection reset"));
    rig.link.push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    match &outcome.status {
        CycleStatus::ClassificationFailed { reason } => assert!(reason.contains("connection reset")),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(outcome.classification.is_none());
    assert!(outcome.actuation.is_none());
    assert_eq!(rig.actuator.speak_count(), 0);
}

/// A stalled classifier hits the core timeout and is handled like an error.
#[tokio::test(start_paused = true)]
async fn classifier_timeout_matches_classifier_error() {
    let mut rig = rig(FakeClassifier::stalling(Duration::from_secs(3600)));
    rig.link.push_line(READING);

    let started = tokio::time::Instant::now();
    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;
    let elapsed = started.elapsed();

    match &outcome.status {
        CycleStatus::ClassificationFailed { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(!outcome.is_fault());
    assert!(outcome.actuation.is_none());
    assert_eq!(rig.link.count(LinkCommand::Alarm), 0);
    // settle + one poll + classifier timeout, far short of the stall.
    assert!(elapsed < Duration::from_secs(60), "elapsed {elapsed:?}");
    assert_eq!(rig.link.count(LinkCommand::Hold), 1);

    // The controller is reusable after a timed-out cycle.
    rig.classifier
        .set_script(safer_core::fakes::ClassifierScript::Respond("ok LOW".to_string()));
    rig.link.push_line(READING);
    let next = rig.controller.run_one_cycle(&Shutdown::never()).await;
    assert_eq!(next.status, CycleStatus::Classified);
}

/// Actuation failures are reported but leave the risk determination intact.
#[tokio::test(start_paused = true)]
async fn actuation_failures_do_not_change_outcome() {
    let mut rig = rig_with(
        FakeCamera::new(),
        FakeClassifier::responding("Fumo denso. HIGH"),
        FakeActuator::failing(),
    );
    rig.link.fail_command(LinkCommand::Alarm).push_line(READING);

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert_eq!(outcome.status, CycleStatus::Classified);
    assert_eq!(
        outcome.classification.as_ref().map(|c| c.risk_level),
        Some(RiskLevel::High)
    );
    let report = outcome.actuation.expect("actuation attempted");
    assert!(!report.alarm_signalled);
    assert!(!report.spoken);
    assert_eq!(report.errors.len(), 2);
    // Speech is still attempted after the alarm write fails.
    assert_eq!(rig.actuator.speak_count(), 1);
}

/// The hold command goes out exactly once on every terminal path.
#[tokio::test(start_paused = true)]
async fn hold_sent_exactly_once_on_every_path() {
    // success
    let mut ok = rig(FakeClassifier::responding("Fumo. HIGH"));
    ok.link.push_line(READING);
    ok.controller.run_one_cycle(&Shutdown::never()).await;

    // no reading
    let mut silent = rig(FakeClassifier::responding("ok LOW"));
    silent.controller.run_one_cycle(&Shutdown::never()).await;

    // fault at arming
    let mut fault = rig(FakeClassifier::responding("ok LOW"));
    fault.link.fail_command(LinkCommand::Arm);
    fault.controller.run_one_cycle(&Shutdown::never()).await;

    // capture failure
    let mut capture = rig_with(
        FakeCamera::failing(),
        FakeClassifier::responding("ok LOW"),
        FakeActuator::new(),
    );
    capture.link.push_line(READING);
    capture.controller.run_one_cycle(&Shutdown::never()).await;

    // classification failure
    let mut classify = rig(FakeClassifier::failing("503"));
    classify.link.push_line(READING);
    classify.controller.run_one_cycle(&Shutdown::never()).await;

    for rig in [&ok, &silent, &fault, &capture, &classify] {
        assert_eq!(rig.link.count(LinkCommand::Hold), 1);
        assert_eq!(rig.link.count(LinkCommand::Arm), 1);
        assert_eq!(rig.link.sent()[0], LinkCommand::Arm);
    }
}

/// Shutdown during settling aborts to cleanup, which still sends the hold.
#[tokio::test(start_paused = true)]
async fn shutdown_during_settle_still_sends_hold() {
    let rig = rig(FakeClassifier::responding("ok HIGH"));
    rig.link.push_line(READING);
    let (trigger, signal) = shutdown::channel();

    let link = rig.link.clone();
    let camera = rig.camera.clone();
    let task = tokio::spawn(async move {
        let mut controller = rig.controller;
        let outcome = controller.run_one_cycle(&signal).await;
        (outcome, controller.state())
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    trigger.trigger();
    let (outcome, state) = task.await.expect("cycle task");

    assert_eq!(outcome.status, CycleStatus::Cancelled);
    assert_eq!(outcome.final_state, CycleState::CycleComplete);
    assert_eq!(link.sent(), vec![LinkCommand::Arm, LinkCommand::Hold]);
    assert_eq!(link.poll_count(), 0);
    assert_eq!(camera.capture_count(), 0);
    assert_eq!(state, CycleState::Idle);
}

/// Shutdown while polling stops the remaining poll iterations.
#[tokio::test(start_paused = true)]
async fn shutdown_while_polling_stops_early() {
    let rig = rig(FakeClassifier::responding("ok HIGH"));
    let (trigger, signal) = shutdown::channel();

    let link = rig.link.clone();
    let task = tokio::spawn(async move {
        let mut controller = rig.controller;
        controller.run_one_cycle(&signal).await
    });

    // settle (20s) plus three polls.
    tokio::time::sleep(Duration::from_millis(23_500)).await;
    trigger.trigger();
    let outcome = task.await.expect("cycle task");

    assert_eq!(outcome.status, CycleStatus::Cancelled);
    assert_eq!(link.poll_count(), 3);
    assert_eq!(link.count(LinkCommand::Hold), 1);
}

/// Shutdown while the camera is still capturing ends the cycle before
/// classification.
#[tokio::test(start_paused = true)]
async fn shutdown_during_capture_skips_classification() {
    let rig = rig_with(
        FakeCamera::stalling(Duration::from_secs(60)),
        FakeClassifier::responding("Fumo. HIGH"),
        FakeActuator::new(),
    );
    rig.link.push_line(READING);
    let (trigger, signal) = shutdown::channel();

    let link = rig.link.clone();
    let camera = rig.camera.clone();
    let classifier = rig.classifier.clone();
    let task = tokio::spawn(async move {
        let mut controller = rig.controller;
        controller.run_one_cycle(&signal).await
    });

    // Reading arrives at 21s; the capture would finish at 81s.
    tokio::time::sleep(Duration::from_secs(25)).await;
    trigger.trigger();
    let outcome = task.await.expect("cycle task");

    assert_eq!(outcome.status, CycleStatus::Cancelled);
    assert_eq!(outcome.final_state, CycleState::CycleComplete);
    assert_eq!(camera.capture_count(), 1);
    assert_eq!(classifier.call_count(), 0);
    assert_eq!(link.count(LinkCommand::Hold), 1);
    assert_eq!(link.count(LinkCommand::Alarm), 0);
}

/// Shutdown while waiting on the classifier abandons the call.
#[tokio::test(start_paused = true)]
async fn shutdown_during_classification_abandons_call() {
    let rig = rig(FakeClassifier::stalling(Duration::from_secs(25)));
    rig.link.push_line(READING);
    let (trigger, signal) = shutdown::channel();

    let link = rig.link.clone();
    let classifier = rig.classifier.clone();
    let actuator = rig.actuator.clone();
    let task = tokio::spawn(async move {
        let mut controller = rig.controller;
        controller.run_one_cycle(&signal).await
    });

    tokio::time::sleep(Duration::from_secs(25)).await;
    trigger.trigger();
    let outcome = task.await.expect("cycle task");

    assert_eq!(outcome.status, CycleStatus::Cancelled);
    assert!(outcome.classification.is_none());
    assert_eq!(classifier.call_count(), 1);
    assert_eq!(actuator.speak_count(), 0);
    assert_eq!(link.count(LinkCommand::Alarm), 0);
    assert_eq!(link.count(LinkCommand::Hold), 1);
}

/// An alarm already being announced plays to the end despite shutdown.
#[tokio::test(start_paused = true)]
async fn shutdown_during_announcement_lets_it_finish() {
    let rig = rig_with(
        FakeCamera::new(),
        FakeClassifier::responding("Fumo oltre 30 ppm, evacuare. HIGH"),
        FakeActuator::slow(Duration::from_secs(10)),
    );
    rig.link.push_line(READING);
    let (trigger, signal) = shutdown::channel();

    let link = rig.link.clone();
    let actuator = rig.actuator.clone();
    let task = tokio::spawn(async move {
        let mut controller = rig.controller;
        controller.run_one_cycle(&signal).await
    });

    // Alarm at 21s, playback until 31s.
    tokio::time::sleep(Duration::from_secs(25)).await;
    trigger.trigger();
    let outcome = task.await.expect("cycle task");

    assert_eq!(outcome.status, CycleStatus::Classified);
    let actuation = outcome.actuation.expect("actuation report");
    assert!(actuation.alarm_signalled);
    assert!(actuation.spoken);
    assert_eq!(actuator.finished_count(), 1);
    assert_eq!(link.count(LinkCommand::Alarm), 1);
    assert!(outcome.duration_ms >= 31_000);
}

/// A link that stops delivering input faults the cycle instead of looking
/// like a quiet sensor.
#[tokio::test(start_paused = true)]
async fn lost_link_while_polling_faults_cycle() {
    let mut rig = rig(FakeClassifier::responding("ok LOW"));
    rig.link.disconnect();

    let outcome = rig.controller.run_one_cycle(&Shutdown::never()).await;

    assert_eq!(outcome.status.name(), "faulted");
    assert_eq!(outcome.final_state, CycleState::Faulted);
    assert_eq!(rig.link.poll_count(), 1);
    assert_eq!(rig.camera.capture_count(), 0);
    assert_eq!(rig.link.count(LinkCommand::Hold), 1);
    assert_eq!(rig.controller.state(), CycleState::Idle);
}
