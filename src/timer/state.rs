use serde::{Deserialize, Serialize};

use crate::{
    alerts::Alert,
    display::{ControlLabel, DisplayUpdate},
};

/// Interval lengths offered by the interval button, in seconds, cycled in order.
pub const DURATIONS_SECS: [u32; 9] = [30, 45, 60, 90, 120, 150, 180, 300, 600];

/// The one duration rendered as a word label rather than `m:ss`.
const LONGEST_SECS: u32 = 600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    CycleDuration,
    Clear,
    ToggleStart,
    Tick,
}

/// What a transition asks the outside world to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEffect {
    StartTicks,
    CancelTicks,
    Display(DisplayUpdate),
    ScheduleAlert(Alert),
    CompletionCue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IntervalTimerState {
    pub remaining_secs: u32,
    pub set_count: u32,
    pub duration_index: usize,
    pub run_state: RunState,
}

impl Default for IntervalTimerState {
    fn default() -> Self {
        Self {
            remaining_secs: DURATIONS_SECS[0],
            set_count: 1,
            duration_index: 0,
            run_state: RunState::Idle,
        }
    }
}

/// Renders seconds as `m:ss`; the longest interval reads `10 M`.
pub fn format_time(secs: u32) -> String {
    if secs == LONGEST_SECS {
        return "10 M".to_string();
    }
    format!("{}:{:02}", secs / 60, secs % 60)
}

impl IntervalTimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_duration(&self) -> u32 {
        DURATIONS_SECS[self.duration_index % DURATIONS_SECS.len()]
    }

    pub fn countdown_text(&self) -> String {
        format_time(self.remaining_secs)
    }

    /// Everything the screen needs to show this state from scratch.
    pub fn snapshot(&self) -> Vec<DisplayUpdate> {
        vec![
            self.countdown_update(),
            DisplayUpdate::SetCount {
                count: self.set_count,
            },
            DisplayUpdate::ControlLabel {
                label: match self.run_state {
                    RunState::Running => ControlLabel::Stop,
                    RunState::Idle | RunState::Paused => ControlLabel::Start,
                },
            },
        ]
    }

    pub fn apply(&mut self, event: TimerEvent) -> Vec<TimerEffect> {
        match event {
            TimerEvent::CycleDuration => self.cycle_duration(),
            TimerEvent::Clear => self.clear(),
            TimerEvent::ToggleStart => self.toggle_start(),
            TimerEvent::Tick => self.tick(),
        }
    }

    pub fn cycle_duration(&mut self) -> Vec<TimerEffect> {
        self.duration_index = (self.duration_index + 1) % DURATIONS_SECS.len();
        self.remaining_secs = self.selected_duration();
        self.run_state = RunState::Idle;

        vec![
            TimerEffect::CancelTicks,
            TimerEffect::Display(self.countdown_update()),
            label(ControlLabel::Start),
        ]
    }

    pub fn clear(&mut self) -> Vec<TimerEffect> {
        self.remaining_secs = self.selected_duration();
        self.set_count = 1;
        self.run_state = RunState::Idle;

        vec![
            TimerEffect::CancelTicks,
            TimerEffect::Display(self.countdown_update()),
            TimerEffect::Display(DisplayUpdate::SetCount { count: 1 }),
            label(ControlLabel::Start),
        ]
    }

    pub fn toggle_start(&mut self) -> Vec<TimerEffect> {
        match self.run_state {
            RunState::Idle => {
                self.remaining_secs = self.selected_duration();
                self.run_state = RunState::Running;
                vec![
                    TimerEffect::StartTicks,
                    TimerEffect::Display(self.countdown_update()),
                    label(ControlLabel::Stop),
                ]
            }
            RunState::Running => {
                self.run_state = RunState::Paused;
                vec![TimerEffect::CancelTicks, label(ControlLabel::Start)]
            }
            RunState::Paused => {
                // Resume where we left off.
                self.run_state = RunState::Running;
                vec![TimerEffect::StartTicks, label(ControlLabel::Stop)]
            }
        }
    }

    /// One second elapsed. A tick while not running yields nothing.
    pub fn tick(&mut self) -> Vec<TimerEffect> {
        if self.run_state != RunState::Running {
            return Vec::new();
        }

        let mut effects = if self.remaining_secs < 1 {
            self.remaining_secs = self.selected_duration();
            self.set_count += 1;
            self.run_state = RunState::Idle;
            vec![
                TimerEffect::CancelTicks,
                TimerEffect::Display(self.countdown_update()),
                TimerEffect::Display(DisplayUpdate::SetCount {
                    count: self.set_count,
                }),
                label(ControlLabel::Start),
                TimerEffect::ScheduleAlert(Alert::timer_done()),
            ]
        } else {
            self.remaining_secs -= 1;
            vec![TimerEffect::Display(self.countdown_update())]
        };

        if self.remaining_secs == 0 {
            effects.push(TimerEffect::CompletionCue);
        }
        effects
    }

    fn countdown_update(&self) -> DisplayUpdate {
        DisplayUpdate::CountdownText {
            text: self.countdown_text(),
        }
    }
}

fn label(label: ControlLabel) -> TimerEffect {
    TimerEffect::Display(DisplayUpdate::ControlLabel { label })
}
