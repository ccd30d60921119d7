use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::{display::DisplayUpdate, error::BiometricError};

use super::{
    service::{
        ActivityProfile, BiometricService, DataType, ExternalSessionState, HeartRateSample,
        ReadingSink, SessionHandle, SessionObserver, SubscriptionHandle,
    },
    state::{SessionEffect, SessionMachine, SessionPhase},
};

/// Runs [`SessionMachine`] against a [`BiometricService`].
///
/// Service requests are issued inline; their immediate results are fed back
/// into the machine until only display updates remain.
pub struct SessionController {
    machine: SessionMachine,
    service: Arc<dyn BiometricService>,
    observer: Arc<dyn SessionObserver>,
    readings: Arc<dyn ReadingSink>,
    /// Set when the device or the user has ruled the feature out.
    blocked: Option<BiometricError>,
}

impl SessionController {
    pub fn new(
        service: Arc<dyn BiometricService>,
        observer: Arc<dyn SessionObserver>,
        readings: Arc<dyn ReadingSink>,
        profile: ActivityProfile,
        pulse_duration_ms: u64,
    ) -> Self {
        Self {
            machine: SessionMachine::new(profile, pulse_duration_ms),
            service,
            observer,
            readings,
            blocked: None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn machine(&self) -> &SessionMachine {
        &self.machine
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked.is_some()
    }

    /// Checks availability and permission once. On failure the session feature
    /// stays off for the life of the controller.
    pub fn authorize(&mut self) -> Result<(), BiometricError> {
        let outcome = if !self.service.is_available() {
            Err(BiometricError::Unavailable)
        } else if !self.service.request_authorization(&[DataType::HeartRate]) {
            Err(BiometricError::NotAuthorized)
        } else {
            Ok(())
        };

        if let Err(err) = &outcome {
            warn!("session feature disabled: {err}");
            self.blocked = Some(err.clone());
        }
        outcome
    }

    pub fn start(&mut self) -> Vec<DisplayUpdate> {
        if let Some(reason) = &self.blocked {
            info!("start ignored: {reason}");
            return Vec::new();
        }
        let effects = self.machine.start();
        self.run(effects)
    }

    pub fn stop(&mut self) -> Vec<DisplayUpdate> {
        let effects = self.machine.stop();
        self.run(effects)
    }

    /// Starts when idle, stops otherwise.
    pub fn toggle(&mut self) -> Vec<DisplayUpdate> {
        match self.machine.phase() {
            SessionPhase::NoSession => self.start(),
            SessionPhase::Created | SessionPhase::Active => self.stop(),
        }
    }

    pub fn on_external_state_changed(
        &mut self,
        handle: SessionHandle,
        state: ExternalSessionState,
        at: DateTime<Utc>,
    ) -> Vec<DisplayUpdate> {
        let effects = self.machine.on_external_state_changed(handle, state, at);
        self.run(effects)
    }

    pub fn on_runtime_error(&mut self, handle: SessionHandle, err: BiometricError) -> Vec<DisplayUpdate> {
        let effects = self.machine.on_runtime_error(handle, err);
        self.run(effects)
    }

    pub fn on_reading_batch(
        &mut self,
        query: SubscriptionHandle,
        samples: &[HeartRateSample],
    ) -> Vec<DisplayUpdate> {
        let effects = self.machine.on_reading_batch(query, samples);
        self.run(effects)
    }

    pub fn teardown(&mut self) {
        let effects = self.machine.teardown();
        self.run(effects);
    }

    fn run(&mut self, effects: Vec<SessionEffect>) -> Vec<DisplayUpdate> {
        let mut queue: VecDeque<SessionEffect> = effects.into();
        let mut display = Vec::new();

        while let Some(effect) = queue.pop_front() {
            match effect {
                SessionEffect::CreateSession(profile) => {
                    let result = self.service.create_session(&profile, self.observer.clone());
                    queue.extend(self.machine.on_session_created(result));
                }
                SessionEffect::EndSession(handle) => self.service.end_session(&handle),
                SessionEffect::OpenSubscription(request) => {
                    let result = self
                        .service
                        .open_subscription(&request, self.readings.clone());
                    queue.extend(self.machine.on_subscription_opened(request, result));
                }
                SessionEffect::CloseSubscription(query) => self.service.close_subscription(&query),
                SessionEffect::Display(update) => display.push(update),
            }
        }
        display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusText;
    use crate::session::service::SubscriptionRequest;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create,
        End(SessionHandle),
        Open,
        Close(SubscriptionHandle),
    }

    #[derive(Default)]
    struct FakeService {
        unavailable: bool,
        deny: bool,
        fail_create: bool,
        calls: Mutex<Vec<Call>>,
        last_session: Mutex<Option<SessionHandle>>,
        last_subscription: Mutex<Option<SubscriptionHandle>>,
    }

    impl FakeService {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl BiometricService for FakeService {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn request_authorization(&self, _: &[DataType]) -> bool {
            !self.deny
        }

        fn create_session(
            &self,
            _: &ActivityProfile,
            _: Arc<dyn SessionObserver>,
        ) -> Result<SessionHandle, BiometricError> {
            self.calls.lock().unwrap().push(Call::Create);
            if self.fail_create {
                return Err(BiometricError::SessionCreateFailed("busy".into()));
            }
            let handle = SessionHandle::new();
            *self.last_session.lock().unwrap() = Some(handle);
            Ok(handle)
        }

        fn end_session(&self, session: &SessionHandle) {
            self.calls.lock().unwrap().push(Call::End(*session));
        }

        fn open_subscription(
            &self,
            _: &SubscriptionRequest,
            _: Arc<dyn ReadingSink>,
        ) -> Result<SubscriptionHandle, BiometricError> {
            self.calls.lock().unwrap().push(Call::Open);
            let handle = SubscriptionHandle::new();
            *self.last_subscription.lock().unwrap() = Some(handle);
            Ok(handle)
        }

        fn close_subscription(&self, subscription: &SubscriptionHandle) {
            self.calls.lock().unwrap().push(Call::Close(*subscription));
        }
    }

    struct Nowhere;

    impl SessionObserver for Nowhere {
        fn state_changed(&self, _: SessionHandle, _: ExternalSessionState, _: DateTime<Utc>) {}
        fn failed(&self, _: SessionHandle, _: BiometricError) {}
    }

    impl ReadingSink for Nowhere {
        fn deliver(&self, _: SubscriptionHandle, _: Vec<HeartRateSample>) {}
    }

    fn controller(service: Arc<FakeService>) -> SessionController {
        SessionController::new(
            service,
            Arc::new(Nowhere),
            Arc::new(Nowhere),
            ActivityProfile::default(),
            500,
        )
    }

    #[test]
    fn create_failure_shows_cannot_start_and_opens_nothing() {
        let service = Arc::new(FakeService {
            fail_create: true,
            ..Default::default()
        });
        let mut c = controller(service.clone());
        let display = c.start();

        assert_eq!(
            display,
            vec![DisplayUpdate::Status {
                status: StatusText::CannotStart
            }]
        );
        assert_eq!(c.phase(), SessionPhase::NoSession);
        assert_eq!(service.calls(), vec![Call::Create]);
    }

    #[test]
    fn running_then_ended_opens_and_closes_subscription() {
        let service = Arc::new(FakeService::default());
        let mut c = controller(service.clone());
        c.start();
        let handle = service.last_session.lock().unwrap().unwrap();

        c.on_external_state_changed(handle, ExternalSessionState::Running, Utc::now());
        assert_eq!(c.phase(), SessionPhase::Active);
        let query = service.last_subscription.lock().unwrap().unwrap();

        c.on_external_state_changed(handle, ExternalSessionState::Ended, Utc::now());
        assert_eq!(c.phase(), SessionPhase::NoSession);
        assert_eq!(
            service.calls(),
            vec![Call::Create, Call::Open, Call::Close(query)]
        );
    }

    #[test]
    fn toggle_requests_end_but_keeps_state_until_ended() {
        let service = Arc::new(FakeService::default());
        let mut c = controller(service.clone());
        c.toggle();
        let handle = service.last_session.lock().unwrap().unwrap();
        c.toggle();
        c.toggle();

        assert_eq!(service.calls(), vec![Call::Create, Call::End(handle)]);
        assert_eq!(c.phase(), SessionPhase::Created);
    }

    #[test]
    fn unavailable_blocks_start() {
        let service = Arc::new(FakeService {
            unavailable: true,
            ..Default::default()
        });
        let mut c = controller(service.clone());
        assert_eq!(c.authorize(), Err(BiometricError::Unavailable));
        assert!(c.start().is_empty());
        assert!(service.calls().is_empty());
    }

    #[test]
    fn denied_permission_blocks_start() {
        let service = Arc::new(FakeService {
            deny: true,
            ..Default::default()
        });
        let mut c = controller(service);
        assert_eq!(c.authorize(), Err(BiometricError::NotAuthorized));
        assert!(c.is_blocked());
    }

    #[test]
    fn teardown_closes_open_subscription() {
        let service = Arc::new(FakeService::default());
        let mut c = controller(service.clone());
        c.start();
        let handle = service.last_session.lock().unwrap().unwrap();
        c.on_external_state_changed(handle, ExternalSessionState::Running, Utc::now());
        let query = service.last_subscription.lock().unwrap().unwrap();

        c.teardown();
        assert_eq!(service.calls().last(), Some(&Call::Close(query)));
    }
}
