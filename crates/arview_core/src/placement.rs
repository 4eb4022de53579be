//! # Placement State Machine
//!
//! ## States
//!
//! - **Searching**: no surface committed. Each frame previews where the model
//!   would go by moving the indicator to the current hit, or hiding it.
//! - **Placed**: the model is pinned to the pose found at select time. Terminal
//!   for the rest of the session; frames and selects are no-ops.
//!
//! ```text
//!            on_frame(hit?)            on_select() with a fresh hit
//!           ┌──────────────┐          ┌─────────────────────────────┐
//!           ▼              │          │                             ▼
//!       ┌───────────┐──────┘──────────┘                     ┌──────────┐
//!       │ Searching │ ───────────────────────────────────▶  │  Placed  │
//!       └───────────┘                                       └──────────┘
//! ```
//!
//! ## Freshness
//!
//! `on_select` never looks at what `on_frame` saw. It is handed a query and
//! runs it itself, so the pose reflects the device at selection time rather
//! than the last preview.

use arview_shared::RigidTransform;

use crate::hit_test::HitResult;

/// Placement phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlacementState {
    /// Looking for a surface.
    #[default]
    Searching,
    /// Model committed to a pose.
    Placed,
}

/// Visibility and pose of one scene element.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Visual {
    /// Drawn or not.
    pub visible: bool,
    /// Pose in the world-local frame.
    pub transform: RigidTransform,
}

/// Everything the renderer needs from the state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlacementVisuals {
    /// The placement indicator.
    pub indicator: Visual,
    /// The model.
    pub model: Visual,
}

/// What a call did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlacementOutcome {
    /// Indicator shown at the hit pose.
    IndicatorShown(RigidTransform),
    /// No surface under the ray; indicator hidden.
    IndicatorHidden,
    /// Model committed at the pose.
    Placed(RigidTransform),
    /// Nothing changed (already placed, or select without a surface).
    Ignored,
    /// The session has ended; the machine no longer accepts input.
    Halted,
}

/// The placement state machine.
#[derive(Debug, Default)]
pub struct PlacementStateMachine {
    state: PlacementState,
    visuals: PlacementVisuals,
    halted: bool,
}

impl PlacementStateMachine {
    /// Creates a machine in `Searching` with everything hidden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> PlacementState {
        self.state
    }

    /// Whether the model has been placed.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.state == PlacementState::Placed
    }

    /// Whether the session behind this machine has ended.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Current indicator and model visuals.
    #[must_use]
    pub const fn visuals(&self) -> PlacementVisuals {
        self.visuals
    }

    /// Per-frame preview.
    ///
    /// Moves the indicator to `hit` or hides it. Never transitions.
    pub fn on_frame(&mut self, hit: Option<HitResult>) -> PlacementOutcome {
        if self.halted {
            return PlacementOutcome::Halted;
        }
        if self.state == PlacementState::Placed {
            return PlacementOutcome::Ignored;
        }

        match hit {
            Some(hit) => {
                self.visuals.indicator = Visual {
                    visible: true,
                    transform: hit.transform,
                };
                PlacementOutcome::IndicatorShown(hit.transform)
            }
            None => {
                self.visuals.indicator.visible = false;
                PlacementOutcome::IndicatorHidden
            }
        }
    }

    /// User select.
    ///
    /// `query` is run only while `Searching` and must perform a fresh hit test.
    /// Without a hit the select is dropped with no side effect.
    pub fn on_select<Q>(&mut self, query: Q) -> PlacementOutcome
    where
        Q: FnOnce() -> Option<HitResult>,
    {
        if self.halted {
            return PlacementOutcome::Halted;
        }
        if self.state == PlacementState::Placed {
            return PlacementOutcome::Ignored;
        }

        let Some(hit) = query() else {
            return PlacementOutcome::Ignored;
        };

        self.visuals.model = Visual {
            visible: true,
            transform: hit.transform,
        };
        self.visuals.indicator.visible = false;
        self.state = PlacementState::Placed;

        tracing::info!(
            "Model placed at ({:.3}, {:.3}, {:.3}) on {}",
            hit.transform.position.x,
            hit.transform.position.y,
            hit.transform.position.z,
            hit.frame
        );
        PlacementOutcome::Placed(hit.transform)
    }

    /// Session ended: back to `Searching`, indicator hidden, no more input.
    ///
    /// No frames follow a session end, so this only affects residual UI state.
    pub fn halt(&mut self) {
        self.state = PlacementState::Searching;
        self.visuals.indicator.visible = false;
        self.halted = true;
    }
}
