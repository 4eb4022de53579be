//! # ARVIEW Core
//!
//! Session lifecycle and hit-test-driven placement for viewing a product model
//! on a real-world surface.
//!
//! ## Pipeline
//!
//! ```text
//! CapabilityProbe ─▶ ModelResolver ─▶ SessionManager.start ─▶ FrameLoop
//!                                                              │ each tick
//!                              HitTestEngine.query ─▶ PlacementStateMachine ─▶ Renderer
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **One mutation point** - placement, load state, lifecycle and the
//!    terminal error live in one [`ViewState`] behind one lock
//! 2. **No stalls in a tick** - loading and negotiation finish before the
//!    frame loop starts
//! 3. **Borrow, never retain** - the frame loop reaches the hit-test source
//!    through a generational handle that dies with `stop()`
//!
//! ## Example
//!
//! ```rust,ignore
//! use arview_core::{ArViewer, ViewerConfig};
//! use arview_core::sim::{SimPlatform, SimRenderer, SimResolver};
//!
//! let viewer = ArViewer::new(SimPlatform::builder().build(), SimResolver::ok(), ViewerConfig::default());
//! let mut view = viewer.launch("/models/sofa.glb", SimRenderer::new).await?;
//! view.select()?;
//! view.stop().await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod capability;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod placement;
pub mod platform;
pub mod scene;
pub mod session;
pub mod sim;
pub mod status;
pub mod viewer;

pub use capability::{Capability, CapabilityProbe};
pub use config::ViewerConfig;
pub use error::{
    CapabilityError, HitTestError, LoadError, PlatformError, SessionError, SessionResult, ViewerError, ViewerResult,
    ERROR_HINT,
};
pub use frame_loop::{FrameLoop, FrameLoopExit, FrameLoopReport, FrameStats, SelectEvent, TickOutcome};
pub use hit_test::{HitResult, HitTestEngine, HitTestHandle, HitTestSource, ReferenceSpaces, SourceSlots};
pub use placement::{PlacementOutcome, PlacementState, PlacementStateMachine, PlacementVisuals, Visual};
pub use platform::{
    EndReason, ModelResolver, ReferenceSpaceId, ReferenceSpaceType, Renderer, SessionInit, SessionMode, XrFeature,
    XrFrame, XrHitTestResult, XrSession, XrSystem, VIEWER_FEATURES,
};
pub use scene::{Camera, HemisphereLight, IndicatorStyle, Model, SceneGraph};
pub use session::SessionManager;
pub use status::{LoadState, SessionLifecycle, SharedViewState, ViewState, ViewerStatus};
pub use viewer::{ArViewer, StatusHandle, ViewerCanceller, ViewerHandle};

pub use arview_shared::{FrameToken, RigidTransform, Vec3};
