use std::{sync::Arc, time::Duration};

use log::debug;

use crate::clock::{ClockSource, TickCallback, TickHandle, TickId};

use super::{IntervalTimerState, RunState, TimerEffect, TimerEvent};

// Set to true to surface ticks that race a pause or clear
const ENABLE_LOGS: bool = false;

use crate::log_warn;

/// Drives [`IntervalTimerState`] against a real tick source.
///
/// Owns at most one [`TickHandle`]. Tick-source effects are carried out here,
/// synchronously, before the remaining effects are handed back to the caller.
pub struct IntervalTimer {
    state: IntervalTimerState,
    clock: Arc<dyn ClockSource>,
    on_tick: TickCallback,
    tick_interval: Duration,
    ticker: Option<TickHandle>,
    next_tick_id: u64,
}

impl IntervalTimer {
    pub fn new(clock: Arc<dyn ClockSource>, on_tick: TickCallback, tick_interval: Duration) -> Self {
        Self {
            state: IntervalTimerState::new(),
            clock,
            on_tick,
            tick_interval,
            ticker: None,
            next_tick_id: 1,
        }
    }

    pub fn state(&self) -> &IntervalTimerState {
        &self.state
    }

    pub fn active_tick(&self) -> Option<TickId> {
        self.ticker.as_ref().map(TickHandle::id)
    }

    pub fn cycle_duration(&mut self) -> Vec<TimerEffect> {
        self.handle(TimerEvent::CycleDuration)
    }

    pub fn clear(&mut self) -> Vec<TimerEffect> {
        self.handle(TimerEvent::Clear)
    }

    pub fn toggle_start(&mut self) -> Vec<TimerEffect> {
        self.handle(TimerEvent::ToggleStart)
    }

    /// Ticks from any source but the live one are dropped.
    pub fn on_tick(&mut self, id: TickId) -> Vec<TimerEffect> {
        if self.active_tick() != Some(id) {
            debug!("dropping stale tick {:?} (live: {:?})", id, self.active_tick());
            return Vec::new();
        }
        if self.state.run_state != RunState::Running {
            log_warn!("tick {:?} arrived while {:?}; ignoring", id, self.state.run_state);
            return Vec::new();
        }
        self.handle(TimerEvent::Tick)
    }

    fn handle(&mut self, event: TimerEvent) -> Vec<TimerEffect> {
        let effects = self.state.apply(event);
        let mut rest = Vec::with_capacity(effects.len());
        for effect in effects {
            match effect {
                TimerEffect::StartTicks => self.spawn_ticker(),
                TimerEffect::CancelTicks => self.cancel_ticker(),
                other => rest.push(other),
            }
        }
        rest
    }

    fn spawn_ticker(&mut self) {
        // Never two sources at once.
        self.cancel_ticker();

        let id = TickId(self.next_tick_id);
        self.next_tick_id += 1;
        let handle = self
            .clock
            .start(id, self.tick_interval, self.on_tick.clone());
        debug!("tick source {:?} started", id);
        self.ticker = Some(handle);
    }

    /// Idempotent.
    pub fn cancel_ticker(&mut self) {
        if let Some(mut handle) = self.ticker.take() {
            handle.cancel();
            debug!("tick source {:?} cancelled", handle.id());
        }
    }
}

impl Drop for IntervalTimer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
