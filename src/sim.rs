//! Stand-ins for the platform: a biometric service that makes up plausible
//! heart rates, and sinks that write screen updates and alerts to the log.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::{
    alerts::{Alert, AlertDispatcher},
    display::{ControlLabel, DisplaySink, DisplayUpdate},
    error::{BiometricError, StatusText},
    session::{
        ActivityProfile, BiometricService, DataType, ExternalSessionState, HeartRateSample,
        ReadingSink, SessionHandle, SessionObserver, SubscriptionHandle, SubscriptionRequest,
    },
};

// Set to true to log every generated batch
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_info, log_warn};

const SOURCE_NAME: &str = "Simulated Watch";
const RESTING_BPM: f64 = 72.0;

pub struct SimulatedService {
    startup_delay: Duration,
    batch_interval: Duration,
    sessions: Mutex<HashMap<SessionHandle, Arc<dyn SessionObserver>>>,
    subscriptions: Mutex<HashMap<SubscriptionHandle, CancellationToken>>,
}

impl Default for SimulatedService {
    fn default() -> Self {
        Self::new(Duration::from_millis(300), Duration::from_secs(1))
    }
}

impl SimulatedService {
    pub fn new(startup_delay: Duration, batch_interval: Duration) -> Self {
        Self {
            startup_delay,
            batch_interval,
            sessions: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn runtime() -> Option<tokio::runtime::Handle> {
        tokio::runtime::Handle::try_current().ok()
    }
}

/// Newest sample first, one to three per batch.
fn make_batch(rng: &mut StdRng, bpm: &mut f64) -> Vec<HeartRateSample> {
    let count = rng.gen_range(1..=3);
    let now = Utc::now();
    (0..count)
        .map(|i| {
            *bpm = (*bpm + rng.gen_range(-3.0..=3.0)).clamp(55.0, 150.0);
            let at = now - chrono::Duration::milliseconds(i64::from(i) * 300);
            HeartRateSample::new(*bpm, SOURCE_NAME, at)
        })
        .collect()
}

impl BiometricService for SimulatedService {
    fn is_available(&self) -> bool {
        true
    }

    fn request_authorization(&self, data_types: &[DataType]) -> bool {
        log_info!("granting access to {:?}", data_types);
        true
    }

    fn create_session(
        &self,
        profile: &ActivityProfile,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, BiometricError> {
        let runtime = Self::runtime()
            .ok_or_else(|| BiometricError::SessionCreateFailed("no async runtime".into()))?;

        let handle = SessionHandle::new();
        info!("simulated {} created for {:?}", handle, profile);
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(handle, observer.clone());
        }

        let delay = self.startup_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            observer.state_changed(handle, ExternalSessionState::Running, Utc::now());
        });
        Ok(handle)
    }

    fn end_session(&self, session: &SessionHandle) {
        let observer = self
            .sessions
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.remove(session));
        let (Some(observer), Some(runtime)) = (observer, Self::runtime()) else {
            log_warn!("end requested for unknown {}", session);
            return;
        };

        let handle = *session;
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            observer.state_changed(handle, ExternalSessionState::Ended, Utc::now());
        });
    }

    fn open_subscription(
        &self,
        request: &SubscriptionRequest,
        sink: Arc<dyn ReadingSink>,
    ) -> Result<SubscriptionHandle, BiometricError> {
        let runtime = Self::runtime()
            .ok_or_else(|| BiometricError::SubscriptionFailed("no async runtime".into()))?;

        let handle = SubscriptionHandle::new();
        let token = CancellationToken::new();
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.insert(handle, token.clone());
        }

        let request = request.clone();
        let period = self.batch_interval;
        runtime.spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut bpm = RESTING_BPM;
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let batch: Vec<_> = make_batch(&mut rng, &mut bpm)
                            .into_iter()
                            .filter(|s| request.admits(s))
                            .collect();
                        log_debug!("{} delivering {} samples", handle, batch.len());
                        if !batch.is_empty() {
                            sink.deliver(handle, batch);
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
        Ok(handle)
    }

    fn close_subscription(&self, subscription: &SubscriptionHandle) {
        if let Some(token) = self
            .subscriptions
            .lock()
            .ok()
            .and_then(|mut subscriptions| subscriptions.remove(subscription))
        {
            token.cancel();
            info!("simulated {} closed", subscription);
        }
    }
}

/// Writes each screen change to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDisplay;

impl LogDisplay {
    fn emit(&self, update: DisplayUpdate) {
        match serde_json::to_string(&update) {
            Ok(json) => info!(target: "display", "{json}"),
            Err(err) => info!(target: "display", "{update:?} ({err})"),
        }
    }
}

impl DisplaySink for LogDisplay {
    fn set_primary_reading(&self, text: &str) {
        self.emit(DisplayUpdate::PrimaryReading { text: text.into() });
    }

    fn set_device_name(&self, text: &str) {
        self.emit(DisplayUpdate::DeviceName { text: text.into() });
    }

    fn set_pulse(&self, on: bool, duration_ms: u64) {
        self.emit(DisplayUpdate::Pulse { on, duration_ms });
    }

    fn set_countdown_text(&self, text: &str) {
        self.emit(DisplayUpdate::CountdownText { text: text.into() });
    }

    fn set_set_count(&self, count: u32) {
        self.emit(DisplayUpdate::SetCount { count });
    }

    fn set_control_label(&self, label: ControlLabel) {
        self.emit(DisplayUpdate::ControlLabel { label });
    }

    fn set_session_label(&self, label: ControlLabel) {
        self.emit(DisplayUpdate::SessionLabel { label });
    }

    fn set_status(&self, status: StatusText) {
        info!(target: "display", "status: {}", status.as_str());
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerts;

impl AlertDispatcher for LogAlerts {
    fn deliver(&self, alert: &Alert) {
        info!(
            target: "alerts",
            "[{}] {} / {} / {}",
            alert.identifier,
            alert.title,
            alert.subtitle,
            alert.body
        );
    }

    fn play_completion_cue(&self) {
        info!(target: "alerts", "*buzz*");
    }
}
