use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::*;
use crate::{
    alerts::RecordingAlerts,
    clock::ManualClock,
    display::{ControlLabel, RecordingDisplay},
    error::{BiometricError, StatusText},
    session::{
        ActivityProfile, DataType, ExternalSessionState, HeartRateSample, ReadingSink,
        SessionHandle, SessionObserver, SubscriptionHandle, SubscriptionRequest,
    },
    timer::RunState,
};

#[derive(Default)]
struct StubService {
    unavailable: bool,
    deny: bool,
    fail_create: bool,
    sessions: Mutex<Vec<SessionHandle>>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    closed: Mutex<Vec<SubscriptionHandle>>,
    ended: Mutex<Vec<SessionHandle>>,
}

impl StubService {
    fn last_session(&self) -> SessionHandle {
        *self.sessions.lock().unwrap().last().expect("no session created")
    }

    fn last_subscription(&self) -> SubscriptionHandle {
        *self
            .subscriptions
            .lock()
            .unwrap()
            .last()
            .expect("no subscription opened")
    }
}

impl BiometricService for StubService {
    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn request_authorization(&self, _: &[DataType]) -> bool {
        !self.deny
    }

    fn create_session(
        &self,
        _: &ActivityProfile,
        _: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, BiometricError> {
        if self.fail_create {
            return Err(BiometricError::SessionCreateFailed("in use".into()));
        }
        let handle = SessionHandle::new();
        self.sessions.lock().unwrap().push(handle);
        Ok(handle)
    }

    fn end_session(&self, session: &SessionHandle) {
        self.ended.lock().unwrap().push(*session);
    }

    fn open_subscription(
        &self,
        _: &SubscriptionRequest,
        _: Arc<dyn ReadingSink>,
    ) -> Result<SubscriptionHandle, BiometricError> {
        let handle = SubscriptionHandle::new();
        self.subscriptions.lock().unwrap().push(handle);
        Ok(handle)
    }

    fn close_subscription(&self, subscription: &SubscriptionHandle) {
        self.closed.lock().unwrap().push(*subscription);
    }
}

struct Rig {
    controller: Controller,
    clock: ManualClock,
    display: Arc<RecordingDisplay>,
    alerts: Arc<RecordingAlerts>,
    service: Arc<StubService>,
}

fn rig_with(service: StubService) -> Rig {
    let clock = ManualClock::new();
    let display = Arc::new(RecordingDisplay::new());
    let alerts = Arc::new(RecordingAlerts::new());
    let service = Arc::new(service);
    let mut controller = Controller::new(
        &Settings::default(),
        service.clone(),
        display.clone(),
        alerts.clone(),
        Arc::new(clock.clone()),
    );
    controller.startup();
    Rig {
        controller,
        clock,
        display,
        alerts,
        service,
    }
}

fn rig() -> Rig {
    rig_with(StubService::default())
}

impl Rig {
    fn press(&mut self, action: UiAction) {
        assert!(self.controller.dispatch(ControlMessage::Ui(action)));
    }

    fn tick(&mut self, times: usize) {
        for _ in 0..times {
            self.clock.fire();
            self.controller.process_pending();
        }
    }

    fn run_session(&mut self) -> (SessionHandle, SubscriptionHandle, DateTime<Utc>) {
        let session = self.service.last_session();
        let at = Utc::now();
        self.controller
            .handle()
            .state_changed(session, ExternalSessionState::Running, at);
        self.controller.process_pending();
        (session, self.service.last_subscription(), at)
    }
}

#[test]
fn startup_paints_timer_and_starts_session() {
    let rig = rig();
    let updates = rig.display.updates();
    assert_eq!(
        &updates[..3],
        &[
            DisplayUpdate::CountdownText { text: "0:30".into() },
            DisplayUpdate::SetCount { count: 1 },
            DisplayUpdate::ControlLabel {
                label: ControlLabel::Start
            },
        ]
    );
    assert_eq!(rig.controller.session_phase(), SessionPhase::Created);
}

#[test]
fn unavailable_device_reports_and_keeps_timer() {
    let mut rig = rig_with(StubService {
        unavailable: true,
        ..Default::default()
    });
    assert_eq!(rig.display.last_status(), Some(StatusText::NotAvailable));
    assert_eq!(rig.controller.session_phase(), SessionPhase::NoSession);

    rig.press(UiAction::ToggleTimer);
    rig.tick(3);
    assert_eq!(rig.controller.timer_state().remaining_secs, 27);
}

#[test]
fn denied_permission_reports_not_allowed() {
    let mut rig = rig_with(StubService {
        deny: true,
        ..Default::default()
    });
    assert_eq!(rig.display.last_status(), Some(StatusText::NotAllowed));
    rig.press(UiAction::ToggleSession);
    assert_eq!(rig.controller.session_phase(), SessionPhase::NoSession);
}

#[test]
fn create_failure_reports_cannot_start() {
    let rig = rig_with(StubService {
        fail_create: true,
        ..Default::default()
    });
    assert_eq!(rig.display.last_status(), Some(StatusText::CannotStart));
    assert_eq!(rig.controller.session_phase(), SessionPhase::NoSession);
    assert!(rig.service.subscriptions.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn thirty_second_interval_completes_once() {
    let mut rig = rig();
    rig.press(UiAction::ToggleTimer);
    assert_eq!(rig.controller.timer_state().run_state, RunState::Running);

    rig.tick(30);
    assert_eq!(rig.display.last_countdown().as_deref(), Some("0:00"));
    assert_eq!(rig.alerts.cues(), 1);
    assert_eq!(rig.controller.timer_state().set_count, 1);

    rig.tick(1);
    let state = rig.controller.timer_state();
    assert_eq!(state.set_count, 2);
    assert_eq!(state.remaining_secs, 30);
    assert_eq!(state.run_state, RunState::Idle);
    assert_eq!(rig.controller.alerts().pending_count(), 1);
    assert_eq!(rig.clock.live_sources(), 0);

    // Further ticks go nowhere; nothing else gets scheduled.
    rig.tick(5);
    assert_eq!(rig.controller.timer_state().set_count, 2);

    tokio::time::sleep(std::time::Duration::from_secs(6)).await;
    assert_eq!(rig.alerts.delivered(), 1);
}

#[test]
fn queued_tick_after_clear_is_ignored() {
    let mut rig = rig();
    rig.press(UiAction::ToggleTimer);
    rig.tick(4);

    // A tick lands in the queue before the clear is handled.
    rig.clock.fire();
    rig.press(UiAction::ClearTimer);
    rig.controller.process_pending();

    let state = rig.controller.timer_state();
    assert_eq!(state.remaining_secs, 30);
    assert_eq!(state.set_count, 1);
    assert_eq!(state.run_state, RunState::Idle);
    assert_eq!(rig.clock.fire(), 0);
}

#[test]
fn queued_tick_after_pause_is_ignored() {
    let mut rig = rig();
    rig.press(UiAction::ToggleTimer);
    rig.tick(2);
    rig.clock.fire();
    rig.press(UiAction::ToggleTimer);
    rig.controller.process_pending();
    assert_eq!(rig.controller.timer_state().remaining_secs, 28);
    assert_eq!(rig.controller.timer_state().run_state, RunState::Paused);

    rig.press(UiAction::ToggleTimer);
    rig.tick(1);
    assert_eq!(rig.controller.timer_state().remaining_secs, 27);
}

#[test]
fn rapid_presses_never_leave_two_sources() {
    let mut rig = rig();
    let presses = [
        UiAction::ToggleTimer,
        UiAction::ToggleTimer,
        UiAction::ToggleTimer,
        UiAction::CycleDuration,
        UiAction::ToggleTimer,
        UiAction::ClearTimer,
        UiAction::ToggleTimer,
        UiAction::ToggleTimer,
        UiAction::ToggleTimer,
    ];
    for action in presses {
        rig.press(action);
        assert!(rig.clock.live_sources() <= 1);
    }
    assert_eq!(rig.clock.live_sources(), 1);
}

#[test]
fn cycle_shows_next_duration() {
    let mut rig = rig();
    for _ in 0..8 {
        rig.press(UiAction::CycleDuration);
    }
    assert_eq!(rig.display.last_countdown().as_deref(), Some("10 M"));
    rig.press(UiAction::CycleDuration);
    assert_eq!(rig.display.last_countdown().as_deref(), Some("0:30"));
}

#[tokio::test(start_paused = true)]
async fn batch_from_another_thread_shows_first_sample_and_pulses() {
    let mut rig = rig();
    let (_, subscription, at) = rig.run_session();
    assert_eq!(rig.controller.session_phase(), SessionPhase::Active);
    rig.display.take();

    let handle = rig.controller.handle();
    std::thread::spawn(move || {
        handle.deliver(
            subscription,
            vec![
                HeartRateSample::new(88.4, "Left Wrist", at),
                HeartRateSample::new(120.0, "Other", at),
                HeartRateSample::new(130.0, "Other", at),
            ],
        );
    })
    .join()
    .unwrap();

    rig.controller.process_pending();
    assert_eq!(
        rig.display.take(),
        vec![
            DisplayUpdate::PrimaryReading { text: "88".into() },
            DisplayUpdate::DeviceName {
                text: "Left Wrist".into()
            },
            DisplayUpdate::Pulse {
                on: true,
                duration_ms: 500
            },
        ]
    );

    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    rig.controller.process_pending();
    assert_eq!(
        rig.display.take(),
        vec![DisplayUpdate::Pulse {
            on: false,
            duration_ms: 500
        }]
    );
}

#[test]
fn ended_without_session_is_safe() {
    let mut rig = rig_with(StubService {
        fail_create: true,
        ..Default::default()
    });
    rig.display.take();
    assert!(rig.controller.dispatch(ControlMessage::SessionStateChanged {
        session: SessionHandle::new(),
        state: ExternalSessionState::Ended,
        at: Utc::now(),
    }));
    assert_eq!(
        rig.display.updates(),
        vec![DisplayUpdate::Status {
            status: StatusText::Placeholder
        }]
    );
}

#[test]
fn session_stop_clears_on_ended_report() {
    let mut rig = rig();
    let (session, subscription, _) = rig.run_session();

    rig.press(UiAction::ToggleSession);
    assert_eq!(rig.controller.session_phase(), SessionPhase::Active);

    rig.controller
        .handle()
        .state_changed(session, ExternalSessionState::Ended, Utc::now());
    rig.controller.process_pending();
    assert_eq!(rig.controller.session_phase(), SessionPhase::NoSession);
    assert_eq!(*rig.service.closed.lock().unwrap(), vec![subscription]);
    assert_eq!(rig.display.last_status(), Some(StatusText::Placeholder));
}

#[test]
fn runtime_error_is_silent() {
    let mut rig = rig();
    let (session, _, _) = rig.run_session();
    rig.display.take();
    rig.controller.handle().failed(
        session,
        BiometricError::SessionRuntimeError("heart sensor lost contact".into()),
    );
    rig.controller.process_pending();
    assert!(rig.display.updates().is_empty());
    assert_eq!(rig.controller.session_phase(), SessionPhase::Active);
}

#[test]
fn runtime_error_before_running_ends_session_and_resets_label() {
    let mut rig = rig();
    let session = rig.service.last_session();
    assert_eq!(rig.controller.session_phase(), SessionPhase::Created);
    rig.display.take();

    rig.controller.handle().failed(
        session,
        BiometricError::SessionRuntimeError("sensor never warmed up".into()),
    );
    rig.controller.process_pending();

    assert_eq!(rig.controller.session_phase(), SessionPhase::NoSession);
    assert_eq!(*rig.service.ended.lock().unwrap(), vec![session]);
    assert_eq!(
        rig.display.updates(),
        vec![
            DisplayUpdate::SessionLabel {
                label: ControlLabel::Start
            },
            DisplayUpdate::Status {
                status: StatusText::CannotStart
            },
        ]
    );
}

#[test]
fn ended_for_stale_session_keeps_current_screen() {
    let mut rig = rig();
    rig.display.take();
    assert!(rig.controller.dispatch(ControlMessage::SessionStateChanged {
        session: SessionHandle::new(),
        state: ExternalSessionState::Ended,
        at: Utc::now(),
    }));
    assert!(rig.display.updates().is_empty());
    assert_eq!(rig.controller.session_phase(), SessionPhase::Created);
}

#[test]
fn shutdown_cancels_ticks_and_closes_subscription() {
    let mut rig = rig();
    let (_, subscription, _) = rig.run_session();
    rig.press(UiAction::ToggleTimer);
    assert_eq!(rig.clock.live_sources(), 1);

    assert!(!rig.controller.dispatch(ControlMessage::Shutdown));
    assert_eq!(rig.clock.live_sources(), 0);
    assert_eq!(*rig.service.closed.lock().unwrap(), vec![subscription]);
    assert!(!rig.controller.dispatch(ControlMessage::Ui(UiAction::ToggleTimer)));
}
