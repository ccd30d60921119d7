use thiserror::Error;

/// Failures reported by the biometric platform service.
///
/// None of these cross the controller boundary as `Err`; each is turned into a
/// status line (or a log entry) where it originates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BiometricError {
    #[error("biometric data is not available on this device")]
    Unavailable,
    #[error("access to heart-rate data was not granted")]
    NotAuthorized,
    #[error("monitoring session could not be created: {0}")]
    SessionCreateFailed(String),
    #[error("monitoring session reported an error: {0}")]
    SessionRuntimeError(String),
    #[error("heart-rate subscription could not be opened: {0}")]
    SubscriptionFailed(String),
}

impl BiometricError {
    /// Status line shown for this failure, if any.
    ///
    /// Runtime errors are log-only and leave the display alone.
    pub fn status(&self) -> Option<StatusText> {
        match self {
            BiometricError::Unavailable => Some(StatusText::NotAvailable),
            BiometricError::NotAuthorized => Some(StatusText::NotAllowed),
            BiometricError::SessionCreateFailed(_) | BiometricError::SubscriptionFailed(_) => {
                Some(StatusText::CannotStart)
            }
            BiometricError::SessionRuntimeError(_) => None,
        }
    }
}

/// The fixed set of status strings the primary label can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusText {
    NotAvailable,
    NotAllowed,
    CannotStart,
    Placeholder,
}

impl StatusText {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusText::NotAvailable => "not available",
            StatusText::NotAllowed => "not allowed",
            StatusText::CannotStart => "cannot start",
            StatusText::Placeholder => "---",
        }
    }
}
