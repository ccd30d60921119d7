pub mod controller;
pub mod state;

pub use controller::IntervalTimer;
pub use state::{
    format_time, IntervalTimerState, RunState, TimerEffect, TimerEvent, DURATIONS_SECS,
};
