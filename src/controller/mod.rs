//! The single owner of both state machines.
//!
//! All mutation happens inside [`Controller::dispatch`], which is only ever
//! called from the task draining the controller queue. Tick sources,
//! reading subscriptions and session notifications hand their events to a
//! [`ControllerHandle`], which enqueues them.

mod messages;

pub use messages::{ControlMessage, ControllerHandle, UiAction};

use std::{sync::Arc, time::Duration};

use log::{debug, info};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver};

use crate::{
    alerts::{AlertDispatcher, AlertScheduler},
    clock::{ClockSource, TickCallback},
    display::{DisplaySink, DisplayUpdate},
    session::{BiometricService, SessionController, SessionPhase},
    settings::Settings,
    timer::{IntervalTimer, IntervalTimerState, TimerEffect},
};

pub struct Controller {
    rx: UnboundedReceiver<ControlMessage>,
    handle: ControllerHandle,
    timer: IntervalTimer,
    session: SessionController,
    display: Arc<dyn DisplaySink>,
    alerts: AlertScheduler,
    auto_start_session: bool,
    pulse_duration_ms: u64,
    pulse_seq: u64,
    shut_down: bool,
}

impl Controller {
    pub fn new(
        settings: &Settings,
        service: Arc<dyn BiometricService>,
        display: Arc<dyn DisplaySink>,
        alerts: Arc<dyn AlertDispatcher>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ControllerHandle::new(tx);

        let tick_handle = handle.clone();
        let on_tick: TickCallback = Arc::new(move |id| {
            tick_handle.tick(id);
        });

        let observer = Arc::new(handle.clone());
        Self {
            rx,
            timer: IntervalTimer::new(clock, on_tick, settings.tick_interval()),
            session: SessionController::new(
                service,
                observer.clone(),
                observer,
                settings.activity,
                settings.pulse_duration_ms,
            ),
            handle,
            display,
            alerts: AlertScheduler::new(alerts),
            auto_start_session: settings.auto_start_session,
            pulse_duration_ms: settings.pulse_duration_ms,
            pulse_seq: 0,
            shut_down: false,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn timer_state(&self) -> &IntervalTimerState {
        self.timer.state()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn alerts(&self) -> &AlertScheduler {
        &self.alerts
    }

    /// Paints the initial screen and, when permitted, starts monitoring.
    pub fn startup(&mut self) {
        let snapshot = self.timer.state().snapshot();
        self.show(snapshot);

        match self.session.authorize() {
            Ok(()) if self.auto_start_session => {
                let updates = self.session.start();
                self.show(updates);
            }
            Ok(()) => info!("biometric access granted; waiting for user to start"),
            Err(err) => {
                if let Some(status) = err.status() {
                    self.show(vec![DisplayUpdate::Status { status }]);
                }
            }
        }
    }

    /// Applies one message. Returns false once the controller has shut down.
    pub fn dispatch(&mut self, message: ControlMessage) -> bool {
        if self.shut_down {
            return false;
        }

        match message {
            ControlMessage::Ui(action) => self.on_ui(action),
            ControlMessage::SessionStateChanged { session, state, at } => {
                let updates = self.session.on_external_state_changed(session, state, at);
                self.show(updates);
            }
            ControlMessage::SessionFailed { session, error } => {
                let updates = self.session.on_runtime_error(session, error);
                self.show(updates);
            }
            ControlMessage::ReadingBatch {
                subscription,
                samples,
            } => {
                let updates = self.session.on_reading_batch(subscription, &samples);
                self.show(updates);
            }
            ControlMessage::Tick(id) => {
                let effects = self.timer.on_tick(id);
                self.apply_timer(effects);
            }
            ControlMessage::PulseElapsed(seq) => {
                if seq == self.pulse_seq {
                    self.display.set_pulse(false, self.pulse_duration_ms);
                }
            }
            ControlMessage::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    /// Applies everything already queued without waiting. Returns the count.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        loop {
            match self.rx.try_recv() {
                Ok(message) => {
                    processed += 1;
                    if !self.dispatch(message) {
                        break;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        processed
    }

    /// Drains the queue until a `Shutdown` message arrives.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            if !self.dispatch(message) {
                break;
            }
        }
        self.shutdown();
    }

    /// Stops the tick source, closes any reading subscription and drops
    /// pending alerts. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.timer.cancel_ticker();
        self.session.teardown();
        self.alerts.cancel_all();
        self.rx.close();
        info!("controller shut down");
    }

    fn on_ui(&mut self, action: UiAction) {
        debug!("ui action {:?}", action);
        match action {
            UiAction::ToggleSession => {
                let updates = self.session.toggle();
                self.show(updates);
            }
            UiAction::CycleDuration => {
                let effects = self.timer.cycle_duration();
                self.apply_timer(effects);
            }
            UiAction::ClearTimer => {
                let effects = self.timer.clear();
                self.apply_timer(effects);
            }
            UiAction::ToggleTimer => {
                let effects = self.timer.toggle_start();
                self.apply_timer(effects);
            }
        }
    }

    fn apply_timer(&mut self, effects: Vec<TimerEffect>) {
        for effect in effects {
            match effect {
                TimerEffect::Display(update) => update.apply_to(self.display.as_ref()),
                TimerEffect::ScheduleAlert(alert) => {
                    info!("interval finished; set {}", self.timer.state().set_count);
                    self.alerts.schedule(alert);
                }
                TimerEffect::CompletionCue => self.alerts.play_completion_cue(),
                // Handled by IntervalTimer before we see them.
                TimerEffect::StartTicks | TimerEffect::CancelTicks => {}
            }
        }
    }

    fn show(&mut self, updates: Vec<DisplayUpdate>) {
        for update in updates {
            if let DisplayUpdate::Pulse {
                on: true,
                duration_ms,
            } = update
            {
                self.pulse_seq += 1;
                self.schedule_pulse_end(self.pulse_seq, duration_ms);
            }
            update.apply_to(self.display.as_ref());
        }
    }

    fn schedule_pulse_end(&self, seq: u64, duration_ms: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime; pulse {} will not shrink", seq);
            return;
        };
        let handle = self.handle.clone();
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(duration_ms)).await;
            handle.send(ControlMessage::PulseElapsed(seq));
        });
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests;
