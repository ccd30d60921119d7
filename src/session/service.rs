//! The biometric platform as seen by the session controller.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BiometricError;

pub const HEART_RATE_UNIT: &str = "count/min";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(pub Uuid);

impl SessionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionHandle(pub Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscription-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    CrossTraining,
    Running,
    Cycling,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationType {
    Indoor,
    Outdoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityProfile {
    pub activity: ActivityType,
    pub location: LocationType,
}

impl Default for ActivityProfile {
    fn default() -> Self {
        Self {
            activity: ActivityType::CrossTraining,
            location: LocationType::Indoor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    HeartRate,
}

/// Session states as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalSessionState {
    Running,
    Ended,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateSample {
    pub value: f64,
    pub unit: String,
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
}

impl HeartRateSample {
    pub fn new(value: f64, source_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            unit: HEART_RATE_UNIT.to_string(),
            source_name: source_name.into(),
            timestamp,
        }
    }
}

/// Open-ended sample filter anchored at the session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub data_type: DataType,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub inclusive_of_start: bool,
}

impl SubscriptionRequest {
    pub fn heart_rate_from(start: DateTime<Utc>) -> Self {
        Self {
            data_type: DataType::HeartRate,
            start,
            end: None,
            inclusive_of_start: true,
        }
    }

    /// Samples stamped exactly at `start` are in; anything earlier is out.
    pub fn admits(&self, sample: &HeartRateSample) -> bool {
        let after_start = if self.inclusive_of_start {
            sample.timestamp >= self.start
        } else {
            sample.timestamp > self.start
        };
        let before_end = self.end.map_or(true, |end| sample.timestamp < end);
        after_start && before_end
    }
}

/// Receives session lifecycle notifications, from any thread.
pub trait SessionObserver: Send + Sync {
    fn state_changed(&self, session: SessionHandle, state: ExternalSessionState, at: DateTime<Utc>);
    fn failed(&self, session: SessionHandle, error: BiometricError);
}

/// Receives reading batches, from any thread.
pub trait ReadingSink: Send + Sync {
    fn deliver(&self, subscription: SubscriptionHandle, samples: Vec<HeartRateSample>);
}

/// Requests here must not block; outcomes that take time come back through
/// the observer or the reading sink.
pub trait BiometricService: Send + Sync {
    fn is_available(&self) -> bool;

    fn request_authorization(&self, data_types: &[DataType]) -> bool;

    fn create_session(
        &self,
        profile: &ActivityProfile,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, BiometricError>;

    fn end_session(&self, session: &SessionHandle);

    fn open_subscription(
        &self,
        request: &SubscriptionRequest,
        sink: Arc<dyn ReadingSink>,
    ) -> Result<SubscriptionHandle, BiometricError>;

    fn close_subscription(&self, subscription: &SubscriptionHandle);
}
