pub mod controller;
pub mod service;
pub mod state;

pub use controller::SessionController;
pub use service::{
    ActivityProfile, ActivityType, BiometricService, DataType, ExternalSessionState,
    HeartRateSample, LocationType, ReadingSink, SessionHandle, SessionObserver,
    SubscriptionHandle, SubscriptionRequest,
};
pub use state::{MonitoringSession, ReadingSubscription, SessionMachine, SessionPhase};
