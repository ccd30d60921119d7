//! Periodic tick sources.
//!
//! Starting a source hands back a [`TickHandle`]; the only way to stop it is
//! to cancel that handle (dropping it cancels too). Every tick carries the
//! [`TickId`] of the source that produced it so a consumer can tell a late
//! tick from a cancelled source apart from a live one.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

// Set to true to trace every tick
const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

/// Called once per period with the id of the emitting source.
pub type TickCallback = Arc<dyn Fn(TickId) + Send + Sync>;

pub trait ClockSource: Send + Sync {
    /// Starts a repeating source. The first tick fires one `period` after the call.
    fn start(&self, id: TickId, period: Duration, on_tick: TickCallback) -> TickHandle;
}

pub struct TickHandle {
    id: TickId,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TickHandle {
    pub fn new(id: TickId, token: CancellationToken, task: Option<JoinHandle<()>>) -> Self {
        Self { id, token, task }
    }

    pub fn id(&self) -> TickId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stops the source. Safe to call more than once.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Tick source backed by a tokio task. Needs a running tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl ClockSource for TokioClock {
    fn start(&self, id: TickId, period: Duration, on_tick: TickCallback) -> TickHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if cancelled.is_cancelled() {
                            break;
                        }
                        log_debug!("tick {:?}", id);
                        on_tick(id);
                    }
                    _ = cancelled.cancelled() => break,
                }
            }
        });

        TickHandle::new(id, token, Some(task))
    }
}

struct ManualSource {
    id: TickId,
    token: CancellationToken,
    on_tick: TickCallback,
}

/// Tick source that only fires when told to. Lets a host (or a test) drive
/// the countdown step by step.
#[derive(Clone, Default)]
pub struct ManualClock {
    sources: Arc<Mutex<Vec<ManualSource>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires one tick on every live source. Returns how many fired.
    pub fn fire(&self) -> usize {
        let live: Vec<(TickId, TickCallback)> = {
            let mut guard = match self.sources.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.retain(|s| !s.token.is_cancelled());
            guard.iter().map(|s| (s.id, s.on_tick.clone())).collect()
        };
        for (id, on_tick) in &live {
            on_tick(*id);
        }
        live.len()
    }

    pub fn live_sources(&self) -> usize {
        match self.sources.lock() {
            Ok(guard) => guard.iter().filter(|s| !s.token.is_cancelled()).count(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .filter(|s| !s.token.is_cancelled())
                .count(),
        }
    }
}

impl ClockSource for ManualClock {
    fn start(&self, id: TickId, _period: Duration, on_tick: TickCallback) -> TickHandle {
        let token = CancellationToken::new();
        let source = ManualSource {
            id,
            token: token.clone(),
            on_tick,
        };
        match self.sources.lock() {
            Ok(mut guard) => guard.push(source),
            Err(poisoned) => poisoned.into_inner().push(source),
        }
        TickHandle::new(id, token, None)
    }
}
