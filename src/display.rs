use std::sync::Mutex;

use serde::Serialize;

use crate::error::StatusText;

/// Label on the interval timer's start/stop button (and the session button).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlLabel {
    Start,
    Stop,
}

impl ControlLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlLabel::Start => "Start",
            ControlLabel::Stop => "Stop",
        }
    }
}

/// A single outbound change to the screen.
///
/// Values are extracted before they are handed over; nothing here borrows
/// from session or timer state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayUpdate {
    PrimaryReading { text: String },
    DeviceName { text: String },
    Pulse { on: bool, duration_ms: u64 },
    CountdownText { text: String },
    SetCount { count: u32 },
    ControlLabel { label: ControlLabel },
    SessionLabel { label: ControlLabel },
    Status { status: StatusText },
}

impl DisplayUpdate {
    pub fn apply_to(&self, sink: &dyn DisplaySink) {
        match self {
            DisplayUpdate::PrimaryReading { text } => sink.set_primary_reading(text),
            DisplayUpdate::DeviceName { text } => sink.set_device_name(text),
            DisplayUpdate::Pulse { on, duration_ms } => sink.set_pulse(*on, *duration_ms),
            DisplayUpdate::CountdownText { text } => sink.set_countdown_text(text),
            DisplayUpdate::SetCount { count } => sink.set_set_count(*count),
            DisplayUpdate::ControlLabel { label } => sink.set_control_label(*label),
            DisplayUpdate::SessionLabel { label } => sink.set_session_label(*label),
            DisplayUpdate::Status { status } => sink.set_status(*status),
        }
    }
}

/// The presentation layer. Calls arrive on the controller's own task only.
pub trait DisplaySink: Send + Sync {
    fn set_primary_reading(&self, text: &str);
    fn set_device_name(&self, text: &str);
    fn set_pulse(&self, on: bool, duration_ms: u64);
    fn set_countdown_text(&self, text: &str);
    fn set_set_count(&self, count: u32);
    fn set_control_label(&self, label: ControlLabel);
    fn set_session_label(&self, label: ControlLabel);
    fn set_status(&self, status: StatusText);
}

/// Sink that keeps every update in order. Useful for hosts that render in
/// batches, and for tests.
#[derive(Default)]
pub struct RecordingDisplay {
    updates: Mutex<Vec<DisplayUpdate>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, update: DisplayUpdate) {
        match self.updates.lock() {
            Ok(mut guard) => guard.push(update),
            Err(poisoned) => poisoned.into_inner().push(update),
        }
    }

    pub fn updates(&self) -> Vec<DisplayUpdate> {
        match self.updates.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drains recorded updates, returning what was there.
    pub fn take(&self) -> Vec<DisplayUpdate> {
        match self.updates.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn last_countdown(&self) -> Option<String> {
        self.updates().into_iter().rev().find_map(|u| match u {
            DisplayUpdate::CountdownText { text } => Some(text),
            _ => None,
        })
    }

    pub fn last_status(&self) -> Option<StatusText> {
        self.updates().into_iter().rev().find_map(|u| match u {
            DisplayUpdate::Status { status } => Some(status),
            _ => None,
        })
    }
}

impl DisplaySink for RecordingDisplay {
    fn set_primary_reading(&self, text: &str) {
        self.push(DisplayUpdate::PrimaryReading { text: text.to_string() });
    }

    fn set_device_name(&self, text: &str) {
        self.push(DisplayUpdate::DeviceName { text: text.to_string() });
    }

    fn set_pulse(&self, on: bool, duration_ms: u64) {
        self.push(DisplayUpdate::Pulse { on, duration_ms });
    }

    fn set_countdown_text(&self, text: &str) {
        self.push(DisplayUpdate::CountdownText { text: text.to_string() });
    }

    fn set_set_count(&self, count: u32) {
        self.push(DisplayUpdate::SetCount { count });
    }

    fn set_control_label(&self, label: ControlLabel) {
        self.push(DisplayUpdate::ControlLabel { label });
    }

    fn set_session_label(&self, label: ControlLabel) {
        self.push(DisplayUpdate::SessionLabel { label });
    }

    fn set_status(&self, status: StatusText) {
        self.push(DisplayUpdate::Status { status });
    }
}
