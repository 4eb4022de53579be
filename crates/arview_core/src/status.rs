//! # View State and Status
//!
//! One owned value holds everything both the frame loop and the outside world
//! look at: capability verdict, model load state, session lifecycle, the
//! placement state machine and the terminal error. It lives behind a single
//! mutex; there is no other mutation point.
//!
//! The status text is never set directly. It is recomputed from those inputs
//! by [`status_message`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::capability::Capability;
use crate::error::ViewerError;
use crate::placement::{PlacementState, PlacementStateMachine};

/// Before the capability verdict.
pub const MSG_INITIALIZING: &str = "Initializing AR...";
/// Capability granted, model resolving.
pub const MSG_LOADING_MODEL: &str = "Loading 3D model...";
/// Ready, searching for a surface.
pub const MSG_TAP_TO_PLACE: &str = "Tap to place product";
/// Session over.
pub const MSG_SESSION_ENDED: &str = "AR session ended";
/// Model resolver failed.
pub const MSG_MODEL_LOAD_FAILED: &str = "Failed to load 3D model";

/// Model load progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    /// Not started.
    #[default]
    Idle,
    /// Resolver running.
    Loading,
    /// Model attached to the scene.
    Loaded,
    /// Resolver failed.
    Failed,
}

/// Lifecycle of the one session a viewer runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionLifecycle {
    /// Not started (or start failed).
    #[default]
    Inactive,
    /// Sensors live, frames flowing.
    Active,
    /// Ended by stop or out of band.
    Ended,
}

/// Inputs the status text is derived from.
#[derive(Clone, Debug, Default)]
pub struct StatusInputs<'a> {
    /// Capability verdict, once known.
    pub capability: Option<&'a Capability>,
    /// Model load progress.
    pub load: LoadState,
    /// Placement phase.
    pub placement: PlacementState,
    /// Session lifecycle.
    pub lifecycle: SessionLifecycle,
    /// Terminal error, if any.
    pub error: Option<&'a ViewerError>,
}

/// Derives the user-facing status text. `None` means show nothing.
#[must_use]
pub fn status_message(inputs: &StatusInputs<'_>) -> Option<&'static str> {
    if let Some(error) = inputs.error {
        return Some(error.user_message());
    }

    let capability = match inputs.capability {
        None => return Some(MSG_INITIALIZING),
        Some(capability) => capability,
    };
    if let Some(reason) = capability.reason() {
        return Some(ViewerError::Capability(reason.clone()).user_message());
    }

    if inputs.lifecycle == SessionLifecycle::Ended {
        return Some(MSG_SESSION_ENDED);
    }

    match inputs.load {
        LoadState::Idle | LoadState::Loading => Some(MSG_LOADING_MODEL),
        LoadState::Failed => Some(MSG_MODEL_LOAD_FAILED),
        LoadState::Loaded => match inputs.placement {
            PlacementState::Searching => Some(MSG_TAP_TO_PLACE),
            PlacementState::Placed => None,
        },
    }
}

/// What the hosting UI sees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewerStatus {
    /// Human-readable status, if any.
    pub message: Option<&'static str>,
    /// Whether the model has been placed.
    pub placed: bool,
    /// Terminal error replacing the placement UI.
    pub error: Option<ViewerError>,
    /// Session lifecycle.
    pub lifecycle: SessionLifecycle,
}

/// The single owned view state.
#[derive(Debug, Default)]
pub struct ViewState {
    capability: Option<Capability>,
    load: LoadState,
    lifecycle: SessionLifecycle,
    placement: PlacementStateMachine,
    error: Option<ViewerError>,
}

/// The view state behind its one lock.
pub type SharedViewState = Arc<Mutex<ViewState>>;

impl ViewState {
    /// Fresh state: nothing probed, nothing loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh state in its lock.
    #[must_use]
    pub fn shared() -> SharedViewState {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Records the capability verdict. Fixed for the life of the view.
    pub fn set_capability(&mut self, capability: Capability) {
        if self.capability.is_none() {
            self.capability = Some(capability);
        }
    }

    /// Capability verdict, once known.
    #[must_use]
    pub fn capability(&self) -> Option<&Capability> {
        self.capability.as_ref()
    }

    /// Sets model load progress.
    pub fn set_load(&mut self, load: LoadState) {
        self.load = load;
    }

    /// Model load progress.
    #[must_use]
    pub const fn load(&self) -> LoadState {
        self.load
    }

    /// Session lifecycle.
    #[must_use]
    pub const fn lifecycle(&self) -> SessionLifecycle {
        self.lifecycle
    }

    /// Session is live.
    pub fn session_started(&mut self) {
        if self.lifecycle == SessionLifecycle::Inactive {
            self.lifecycle = SessionLifecycle::Active;
        }
    }

    /// Session is over, whoever ended it. Idempotent.
    pub fn session_ended(&mut self) {
        self.lifecycle = SessionLifecycle::Ended;
        self.placement.halt();
    }

    /// Records the terminal error. The first error wins.
    pub fn fail(&mut self, error: ViewerError) {
        if self.error.is_none() {
            tracing::warn!("Viewer failed: {}", error);
            self.error = Some(error);
        }
    }

    /// Terminal error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ViewerError> {
        self.error.as_ref()
    }

    /// The placement state machine.
    #[must_use]
    pub fn placement(&self) -> &PlacementStateMachine {
        &self.placement
    }

    /// Mutable access for the frame loop.
    pub fn placement_mut(&mut self) -> &mut PlacementStateMachine {
        &mut self.placement
    }

    /// Current status text.
    #[must_use]
    pub fn status_message(&self) -> Option<&'static str> {
        status_message(&StatusInputs {
            capability: self.capability.as_ref(),
            load: self.load,
            placement: self.placement.state(),
            lifecycle: self.lifecycle,
            error: self.error.as_ref(),
        })
    }

    /// Snapshot for the hosting UI.
    #[must_use]
    pub fn snapshot(&self) -> ViewerStatus {
        ViewerStatus {
            message: self.status_message(),
            placed: self.placement.is_placed(),
            error: self.error.clone(),
            lifecycle: self.lifecycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapabilityError, LoadError};

    fn supported() -> Capability {
        Capability::supported()
    }

    #[test]
    fn test_status_walks_the_happy_path() {
        let cap = supported();
        let mut inputs = StatusInputs::default();
        assert_eq!(status_message(&inputs), Some(MSG_INITIALIZING));

        inputs.capability = Some(&cap);
        inputs.load = LoadState::Loading;
        assert_eq!(status_message(&inputs), Some(MSG_LOADING_MODEL));

        inputs.load = LoadState::Loaded;
        assert_eq!(status_message(&inputs), Some(MSG_TAP_TO_PLACE));

        inputs.lifecycle = SessionLifecycle::Active;
        inputs.placement = PlacementState::Placed;
        assert_eq!(status_message(&inputs), None);

        inputs.lifecycle = SessionLifecycle::Ended;
        assert_eq!(status_message(&inputs), Some(MSG_SESSION_ENDED));
    }

    #[test]
    fn test_unsupported_capability_is_error_text() {
        let cap = Capability::unsupported(CapabilityError::Denied);
        let inputs = StatusInputs {
            capability: Some(&cap),
            ..StatusInputs::default()
        };
        assert_eq!(status_message(&inputs), Some("AR not supported on your device"));
    }

    #[test]
    fn test_error_overrides_everything() {
        let cap = supported();
        let err = ViewerError::Load(LoadError::Fetch("404".into()));
        let inputs = StatusInputs {
            capability: Some(&cap),
            load: LoadState::Failed,
            error: Some(&err),
            ..StatusInputs::default()
        };
        assert_eq!(status_message(&inputs), Some("Failed to load 3D model"));
    }

    #[test]
    fn test_session_end_unplaces_and_halts() {
        let mut state = ViewState::new();
        state.set_capability(supported());
        state.set_load(LoadState::Loaded);
        state.session_started();
        state.placement_mut().on_select(|| {
            Some(crate::hit_test::HitResult {
                transform: arview_shared::RigidTransform::IDENTITY,
                frame: arview_shared::FrameToken(1),
            })
        });
        assert!(state.snapshot().placed);

        state.session_ended();
        let status = state.snapshot();
        assert!(!status.placed);
        assert_eq!(status.lifecycle, SessionLifecycle::Ended);
        assert_eq!(status.message, Some(MSG_SESSION_ENDED));
        assert!(state.placement().is_halted());
    }

    #[test]
    fn test_first_error_wins() {
        let mut state = ViewState::new();
        state.fail(ViewerError::Initialization("first".into()));
        state.fail(ViewerError::Load(LoadError::NotFound("x".into())));
        assert_eq!(state.error(), Some(&ViewerError::Initialization("first".into())));
    }
}
