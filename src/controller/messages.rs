//! Everything that reaches the controller arrives as a [`ControlMessage`] on
//! one queue. Callbacks from the tick source and the biometric service only
//! enqueue; they never touch state themselves.

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    clock::TickId,
    error::BiometricError,
    session::{
        ExternalSessionState, HeartRateSample, ReadingSink, SessionHandle, SessionObserver,
        SubscriptionHandle,
    },
};

/// Buttons on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    ToggleSession,
    CycleDuration,
    ClearTimer,
    ToggleTimer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Ui(UiAction),
    SessionStateChanged {
        session: SessionHandle,
        state: ExternalSessionState,
        at: DateTime<Utc>,
    },
    SessionFailed {
        session: SessionHandle,
        error: BiometricError,
    },
    ReadingBatch {
        subscription: SubscriptionHandle,
        samples: Vec<HeartRateSample>,
    },
    Tick(TickId),
    /// Ends the pulse started by reading number `seq`.
    PulseElapsed(u64),
    Shutdown,
}

/// Cloneable sending side of the controller queue. Safe to use from any
/// thread; sends after shutdown are dropped.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<ControlMessage>,
}

impl ControllerHandle {
    pub(crate) fn new(tx: UnboundedSender<ControlMessage>) -> Self {
        Self { tx }
    }

    pub fn send(&self, message: ControlMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(err) => {
                debug!("controller gone; dropped {:?}", err.0);
                false
            }
        }
    }

    pub fn ui(&self, action: UiAction) -> bool {
        self.send(ControlMessage::Ui(action))
    }

    pub fn tick(&self, id: TickId) -> bool {
        self.send(ControlMessage::Tick(id))
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControlMessage::Shutdown)
    }
}

impl SessionObserver for ControllerHandle {
    fn state_changed(&self, session: SessionHandle, state: ExternalSessionState, at: DateTime<Utc>) {
        self.send(ControlMessage::SessionStateChanged { session, state, at });
    }

    fn failed(&self, session: SessionHandle, error: BiometricError) {
        self.send(ControlMessage::SessionFailed { session, error });
    }
}

impl ReadingSink for ControllerHandle {
    fn deliver(&self, subscription: SubscriptionHandle, samples: Vec<HeartRateSample>) {
        self.send(ControlMessage::ReadingBatch {
            subscription,
            samples,
        });
    }
}
