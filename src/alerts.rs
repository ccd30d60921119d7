use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;

pub const TIMER_DONE_ID: &str = "timerDone";
pub const TIMER_DONE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub identifier: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub badge: u32,
    #[serde(skip)]
    pub delay: Duration,
}

impl Alert {
    /// The alert raised when a countdown runs out.
    pub fn timer_done() -> Self {
        Self {
            identifier: TIMER_DONE_ID.to_string(),
            title: "How many days are there in one year".to_string(),
            subtitle: "Do you know?".to_string(),
            body: "Do you really know?".to_string(),
            badge: 1,
            delay: TIMER_DONE_DELAY,
        }
    }
}

/// Platform notification surface.
pub trait AlertDispatcher: Send + Sync {
    /// Shows an alert whose delay has already elapsed.
    fn deliver(&self, alert: &Alert);

    /// Short haptic/audio cue, played immediately.
    fn play_completion_cue(&self);
}

/// Schedules one-shot alerts on top of an [`AlertDispatcher`].
///
/// Scheduling an identifier that is still pending replaces the earlier
/// request, so at most one alert per identifier is ever outstanding.
pub struct AlertScheduler {
    dispatcher: Arc<dyn AlertDispatcher>,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl AlertScheduler {
    pub fn new(dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        Self {
            dispatcher,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fire-and-forget. Outside a tokio runtime the alert is dropped with a warning.
    pub fn schedule(&self, alert: Alert) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime to schedule alert '{}'", alert.identifier);
            return;
        };

        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(previous) = pending.remove(&alert.identifier) {
            if !previous.is_finished() {
                info!("replacing pending alert '{}'", alert.identifier);
            }
            previous.abort();
        }

        let dispatcher = self.dispatcher.clone();
        let identifier = alert.identifier.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(alert.delay).await;
            dispatcher.deliver(&alert);
        });

        pending.insert(identifier, task);
    }

    pub fn play_completion_cue(&self) {
        self.dispatcher.play_completion_cue();
    }

    pub fn pending_count(&self) -> usize {
        match self.pending.lock() {
            Ok(guard) => guard.values().filter(|h| !h.is_finished()).count(),
            Err(_) => 0,
        }
    }

    /// Drops every alert that has not fired yet.
    pub fn cancel_all(&self) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("alert registry poisoned; clearing anyway");
                poisoned.into_inner()
            }
        };
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}

impl Drop for AlertScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Delivered(Alert),
    Cue,
}

/// Dispatcher that records what it was asked to do.
#[derive(Default)]
pub struct RecordingAlerts {
    events: Mutex<Vec<AlertEvent>>,
}

impl RecordingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn delivered(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, AlertEvent::Delivered(_)))
            .count()
    }

    pub fn cues(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, AlertEvent::Cue))
            .count()
    }

    fn push(&self, event: AlertEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl AlertDispatcher for RecordingAlerts {
    fn deliver(&self, alert: &Alert) {
        self.push(AlertEvent::Delivered(alert.clone()));
    }

    fn play_completion_cue(&self) {
        self.push(AlertEvent::Cue);
    }
}
