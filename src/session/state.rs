use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    display::{ControlLabel, DisplayUpdate},
    error::{BiometricError, StatusText},
};

use super::service::{
    ActivityProfile, ExternalSessionState, HeartRateSample, SessionHandle, SubscriptionHandle,
    SubscriptionRequest,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    NoSession,
    Created,
    Active,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingSubscription {
    pub query: SubscriptionHandle,
    pub request: SubscriptionRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSession {
    pub handle: SessionHandle,
    /// Set once the platform reports the session running.
    pub started_at: Option<DateTime<Utc>>,
    pub subscription: Option<ReadingSubscription>,
    /// A stop was requested; local state clears on the `Ended` report.
    pub ending: bool,
}

/// Requests for the biometric service plus screen changes.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    CreateSession(ActivityProfile),
    EndSession(SessionHandle),
    OpenSubscription(SubscriptionRequest),
    CloseSubscription(SubscriptionHandle),
    Display(DisplayUpdate),
}

/// Heart rates are shown as whole beats per minute.
pub fn format_reading(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0".to_string();
    }
    (value.trunc().min(f64::from(u16::MAX)) as u16).to_string()
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    session: Option<MonitoringSession>,
    profile: ActivityProfile,
    pulse_duration_ms: u64,
    samples_received: u64,
}

impl SessionMachine {
    pub fn new(profile: ActivityProfile, pulse_duration_ms: u64) -> Self {
        Self {
            session: None,
            profile,
            pulse_duration_ms,
            samples_received: 0,
        }
    }

    pub fn session(&self) -> Option<&MonitoringSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.session {
            None => SessionPhase::NoSession,
            Some(s) if s.subscription.is_some() => SessionPhase::Active,
            Some(_) => SessionPhase::Created,
        }
    }

    pub fn samples_received(&self) -> u64 {
        self.samples_received
    }

    pub fn start(&mut self) -> Vec<SessionEffect> {
        if self.session.is_some() {
            debug!("session already present; start ignored");
            return Vec::new();
        }
        vec![SessionEffect::CreateSession(self.profile)]
    }

    pub fn on_session_created(
        &mut self,
        result: Result<SessionHandle, BiometricError>,
    ) -> Vec<SessionEffect> {
        match result {
            Ok(handle) => {
                if let Some(existing) = &self.session {
                    // Cannot happen through `start`; keep the first one.
                    warn!("{} created while {} is held; ending it", handle, existing.handle);
                    return vec![SessionEffect::EndSession(handle)];
                }
                info!("{} created", handle);
                self.session = Some(MonitoringSession {
                    handle,
                    started_at: None,
                    subscription: None,
                    ending: false,
                });
                vec![SessionEffect::Display(DisplayUpdate::SessionLabel {
                    label: ControlLabel::Stop,
                })]
            }
            Err(err) => {
                error!("session start failed: {err}");
                self.session = None;
                status_effects(&err)
            }
        }
    }

    pub fn stop(&mut self) -> Vec<SessionEffect> {
        match self.session.as_mut() {
            Some(session) if !session.ending => {
                session.ending = true;
                vec![
                    SessionEffect::EndSession(session.handle),
                    SessionEffect::Display(DisplayUpdate::SessionLabel {
                        label: ControlLabel::Start,
                    }),
                ]
            }
            Some(session) => {
                debug!("{} already ending", session.handle);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    pub fn on_external_state_changed(
        &mut self,
        handle: SessionHandle,
        state: ExternalSessionState,
        at: DateTime<Utc>,
    ) -> Vec<SessionEffect> {
        match state {
            ExternalSessionState::Running => self.did_start(handle, at),
            ExternalSessionState::Ended => self.did_end(handle),
            ExternalSessionState::Other(name) => {
                info!("{} moved to unexpected state '{}'", handle, name);
                Vec::new()
            }
        }
    }

    fn did_start(&mut self, handle: SessionHandle, at: DateTime<Utc>) -> Vec<SessionEffect> {
        let Some(session) = self.session.as_mut().filter(|s| s.handle == handle) else {
            warn!("running report for unknown {}", handle);
            return Vec::new();
        };
        if session.started_at.is_some() {
            debug!("{} already running", handle);
            return Vec::new();
        }
        session.started_at = Some(at);
        vec![SessionEffect::OpenSubscription(
            SubscriptionRequest::heart_rate_from(at),
        )]
    }

    fn did_end(&mut self, handle: SessionHandle) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        let ours = match &self.session {
            Some(s) if s.handle != handle => {
                debug!("ended report for {} while {} is held; ignoring", handle, s.handle);
                return effects;
            }
            Some(_) => true,
            None => false,
        };
        if ours {
            if let Some(session) = self.session.take() {
                info!("{} ended", session.handle);
                if let Some(subscription) = session.subscription {
                    effects.push(SessionEffect::CloseSubscription(subscription.query));
                }
                effects.push(SessionEffect::Display(DisplayUpdate::SessionLabel {
                    label: ControlLabel::Start,
                }));
            }
        } else {
            debug!("ended report for {} with no matching session", handle);
        }
        effects.push(SessionEffect::Display(DisplayUpdate::Status {
            status: StatusText::Placeholder,
        }));
        effects
    }

    pub fn on_subscription_opened(
        &mut self,
        request: SubscriptionRequest,
        result: Result<SubscriptionHandle, BiometricError>,
    ) -> Vec<SessionEffect> {
        match result {
            Ok(query) => match self.session.as_mut() {
                Some(session) if session.subscription.is_none() => {
                    debug!("{} open for {}", query, session.handle);
                    session.subscription = Some(ReadingSubscription { query, request });
                    Vec::new()
                }
                _ => {
                    warn!("{} opened with nothing to attach to; closing", query);
                    vec![SessionEffect::CloseSubscription(query)]
                }
            },
            Err(err) => {
                error!("{err}");
                status_effects(&err)
            }
        }
    }

    /// Runtime errors only roll back a session that never reached running.
    pub fn on_runtime_error(
        &mut self,
        handle: SessionHandle,
        err: BiometricError,
    ) -> Vec<SessionEffect> {
        warn!("{}: {}", handle, err);
        let never_ran = self
            .session
            .as_ref()
            .is_some_and(|s| s.handle == handle && s.started_at.is_none());
        if !never_ran {
            return Vec::new();
        }
        self.session = None;
        vec![
            SessionEffect::EndSession(handle),
            SessionEffect::Display(DisplayUpdate::SessionLabel {
                label: ControlLabel::Start,
            }),
            SessionEffect::Display(DisplayUpdate::Status {
                status: StatusText::CannotStart,
            }),
        ]
    }

    /// Surfaces the first admitted sample of a batch; the rest are counted only.
    pub fn on_reading_batch(
        &mut self,
        query: SubscriptionHandle,
        samples: &[HeartRateSample],
    ) -> Vec<SessionEffect> {
        let Some(subscription) = self
            .session
            .as_ref()
            .and_then(|s| s.subscription.as_ref())
            .filter(|sub| sub.query == query)
        else {
            debug!("dropping batch of {} from stale {}", samples.len(), query);
            return Vec::new();
        };

        let mut admitted = samples.iter().filter(|s| subscription.request.admits(s));
        let Some(first) = admitted.next() else {
            return Vec::new();
        };
        let value = format_reading(first.value);
        let source = first.source_name.clone();
        self.samples_received += 1 + admitted.count() as u64;

        vec![
            SessionEffect::Display(DisplayUpdate::PrimaryReading { text: value }),
            SessionEffect::Display(DisplayUpdate::DeviceName { text: source }),
            SessionEffect::Display(DisplayUpdate::Pulse {
                on: true,
                duration_ms: self.pulse_duration_ms,
            }),
        ]
    }

    /// Releases the subscription without touching the session itself.
    pub fn teardown(&mut self) -> Vec<SessionEffect> {
        self.session
            .as_mut()
            .and_then(|s| s.subscription.take())
            .map(|sub| vec![SessionEffect::CloseSubscription(sub.query)])
            .unwrap_or_default()
    }
}

fn status_effects(err: &BiometricError) -> Vec<SessionEffect> {
    err.status()
        .map(|status| vec![SessionEffect::Display(DisplayUpdate::Status { status })])
        .unwrap_or_default()
}
