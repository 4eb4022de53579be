//! # Viewer Error Types
//!
//! Every failure here is terminal for the current attempt. Nothing is retried
//! automatically; the hosting UI decides whether to offer a new attempt.
//!
//! An absent hit result is NOT in this taxonomy. Pointing the device at the sky
//! is normal sensing uncertainty and is handled as a silent indicator hide.

use thiserror::Error;

use crate::platform::XrFeature;
use crate::status::{MSG_MODEL_LOAD_FAILED, MSG_SESSION_ENDED};

/// Opaque failure reported by the platform glue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    /// Creates a platform error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The platform cannot provide immersive AR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    /// No XR entry point exists at all.
    #[error("no XR entry point on this platform")]
    Unsupported,

    /// The XR entry point exists but reports immersive AR as unavailable.
    #[error("immersive AR mode reported unavailable")]
    Denied,

    /// The support query itself failed.
    #[error("capability query failed: {0}")]
    ProbeFailed(PlatformError),
}

/// Session negotiation failed or the session ended.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The platform rejected the session request (user declined, no hardware).
    #[error("session request rejected: {0}")]
    Rejected(PlatformError),

    /// The session was granted without a required feature.
    #[error("required feature not granted: {}", .0.as_str())]
    FeatureNotGranted(XrFeature),

    /// A reference space could not be acquired.
    #[error("reference space unavailable: {0}")]
    ReferenceSpace(PlatformError),

    /// The hit-test subscription could not be created.
    #[error(transparent)]
    HitTest(#[from] HitTestError),

    /// Start was cancelled before it completed.
    #[error("session start cancelled")]
    Cancelled,

    /// `start` was called on a manager that already started once.
    #[error("session already started")]
    AlreadyStarted,

    /// The operation needs an active session.
    #[error("no active session")]
    NotActive,

    /// The session has ended.
    #[error("session ended")]
    Ended,
}

/// The external model resolver could not produce a renderable object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Nothing exists at the given location.
    #[error("model not found: {0}")]
    NotFound(String),

    /// Fetching the model failed.
    #[error("model fetch failed: {0}")]
    Fetch(String),

    /// The fetched bytes are not a usable model.
    #[error("model decode failed: {0}")]
    Decode(String),
}

/// Hit-test engine failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HitTestError {
    /// The platform refused to create a hit-test source.
    #[error("hit-test source unavailable: {0}")]
    Unavailable(PlatformError),

    /// A handle was used after its source was released.
    ///
    /// This is a programming error: the session manager released the source
    /// (on stop) and something kept polling it.
    #[error("hit-test handle used after release (slot {index}, generation {generation})")]
    InvalidHandle {
        /// Slot index of the stale handle.
        index: u32,
        /// Generation carried by the stale handle.
        generation: u32,
    },
}

/// Hint shown beneath every error message.
pub const ERROR_HINT: &str = "Try Chrome for Android or Safari on iOS 15+";

/// The single user-visible error state of the viewer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    /// No AR support.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Session negotiation or start failure, or unexpected end.
    #[error(transparent)]
    Session(SessionError),

    /// Model failed to resolve.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The engine could not create a hit source.
    #[error(transparent)]
    HitTestUnavailable(HitTestError),

    /// Anything else that aborted initialization.
    #[error("initialization failed: {0}")]
    Initialization(String),
}

impl From<SessionError> for ViewerError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::HitTest(inner) => Self::HitTestUnavailable(inner),
            other => Self::Session(other),
        }
    }
}

impl From<HitTestError> for ViewerError {
    fn from(e: HitTestError) -> Self {
        Self::HitTestUnavailable(e)
    }
}

impl ViewerError {
    /// Message to display in place of the placement UI.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Capability(CapabilityError::Unsupported) => "WebXR not supported in your browser",
            Self::Capability(CapabilityError::Denied) => "AR not supported on your device",
            Self::Capability(CapabilityError::ProbeFailed(_)) => "Failed to check AR support",
            Self::Load(_) => MSG_MODEL_LOAD_FAILED,
            Self::Session(SessionError::Ended) => MSG_SESSION_ENDED,
            Self::Session(_) | Self::HitTestUnavailable(_) => "Failed to start AR session",
            Self::Initialization(_) => "AR initialization failed",
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for viewer operations.
pub type ViewerResult<T> = Result<T, ViewerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_source_failure_surfaces_as_its_own_kind() {
        let e: ViewerError =
            SessionError::HitTest(HitTestError::Unavailable(PlatformError::new("no planes"))).into();
        assert!(matches!(e, ViewerError::HitTestUnavailable(_)));
        assert_eq!(e.user_message(), "Failed to start AR session");
    }

    #[test]
    fn test_capability_messages() {
        assert_eq!(
            ViewerError::from(CapabilityError::Unsupported).user_message(),
            "WebXR not supported in your browser"
        );
        assert_eq!(
            ViewerError::from(CapabilityError::Denied).user_message(),
            "AR not supported on your device"
        );
    }

    #[test]
    fn test_messages_shared_with_status() {
        assert_eq!(
            ViewerError::Load(LoadError::Fetch("404".into())).user_message(),
            MSG_MODEL_LOAD_FAILED
        );
        assert_eq!(ViewerError::Session(SessionError::Ended).user_message(), MSG_SESSION_ENDED);
        assert_eq!(
            ViewerError::Session(SessionError::Cancelled).user_message(),
            "Failed to start AR session"
        );
    }

    #[test]
    fn test_feature_error_names_feature() {
        let e = SessionError::FeatureNotGranted(XrFeature::DomOverlay);
        assert_eq!(e.to_string(), "required feature not granted: dom-overlay");
    }
}
