//! # Platform Contract
//!
//! The XR platform, the model resolver and the renderer are external
//! collaborators. This module pins down what the core needs from them and
//! nothing more.
//!
//! ```text
//! XrSystem ──request_session──▶ XrSession ──next_frame──▶ XrFrame
//!    │                             │                         │
//!    └─ is_session_supported       ├─ reference spaces       └─ hit_test_results
//!                                  ├─ hit-test sources
//!                                  └─ end / select listeners
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use arview_shared::{FrameToken, RigidTransform};

use crate::error::{LoadError, PlatformError};
use crate::scene::{Camera, Model, SceneGraph};

/// Session modes a platform may offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Camera passthrough with world sensing.
    ImmersiveAr,
    /// Fully rendered headset view.
    ImmersiveVr,
    /// Rendered inside the page, no immersion.
    Inline,
}

impl SessionMode {
    /// Platform name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImmersiveAr => "immersive-ar",
            Self::ImmersiveVr => "immersive-vr",
            Self::Inline => "inline",
        }
    }
}

/// Negotiable session features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XrFeature {
    /// Ray casts against sensed real-world geometry.
    HitTest,
    /// Permission to draw page UI over the camera view.
    DomOverlay,
    /// Persistent spatial anchors.
    Anchors,
    /// Environment light estimation.
    LightEstimation,
}

impl XrFeature {
    /// Platform name of the feature.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HitTest => "hit-test",
            Self::DomOverlay => "dom-overlay",
            Self::Anchors => "anchors",
            Self::LightEstimation => "light-estimation",
        }
    }
}

/// Features requested when entering a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionInit {
    /// The session fails unless every one of these is granted.
    pub required_features: Vec<XrFeature>,
    /// Granted when available, ignored otherwise.
    pub optional_features: Vec<XrFeature>,
}

/// Features no viewer session runs without.
pub const VIEWER_FEATURES: [XrFeature; 2] = [XrFeature::HitTest, XrFeature::DomOverlay];

impl SessionInit {
    /// Adds [`VIEWER_FEATURES`] to the required list, whatever was asked for.
    #[must_use]
    pub fn with_viewer_features(mut self) -> Self {
        for feature in VIEWER_FEATURES {
            if !self.required_features.contains(&feature) {
                self.required_features.push(feature);
            }
        }
        self.optional_features.retain(|f| !self.required_features.contains(f));
        self
    }
}

/// Kinds of reference space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    /// Origin tracks the device; used to cast rays from the screen centre.
    Viewer,
    /// Origin fixed near where the session started; stable world frame.
    Local,
}

/// Platform handle for an acquired reference space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceSpaceId(pub u32);

/// Platform handle for a standing hit-test subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HitTestSourceId(pub u32);

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The user left immersive mode through system UI.
    User,
    /// The platform revoked sensing (tracking loss, backgrounding).
    Platform,
    /// The session manager asked for the end.
    Requested,
}

/// One hit reported by the platform for a frame.
///
/// Carries the raw column-major 4×4 pose matrix; the hit-test engine turns it
/// into a [`RigidTransform`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XrHitTestResult {
    matrix: Option<[f32; 16]>,
}

impl XrHitTestResult {
    /// A hit whose pose is expressible in the requested space.
    #[must_use]
    pub const fn new(matrix: [f32; 16]) -> Self {
        Self { matrix: Some(matrix) }
    }

    /// A hit the platform could not express in the requested space.
    #[must_use]
    pub const fn without_pose() -> Self {
        Self { matrix: None }
    }

    /// Pose matrix of the hit, if expressible.
    #[must_use]
    pub const fn matrix(&self) -> Option<&[f32; 16]> {
        self.matrix.as_ref()
    }
}

/// One display refresh worth of sensor data.
pub trait XrFrame: Send {
    /// Identifies this refresh.
    fn token(&self) -> FrameToken;

    /// Hits for `source` this refresh, nearest first, posed in `base`.
    ///
    /// An empty list is the normal "no surface under the ray" outcome.
    fn hit_test_results(&self, source: HitTestSourceId, base: ReferenceSpaceId) -> Vec<XrHitTestResult>;
}

/// Listener invoked once when a session ends.
pub type EndListener = Box<dyn FnOnce(EndReason) + Send>;

/// Listener invoked on every select (tap / trigger) with the input index.
pub type SelectListener = Box<dyn Fn(u32) + Send + Sync>;

/// The platform XR entry point.
#[async_trait]
pub trait XrSystem: Send + Sync {
    /// Session type produced by this platform.
    type Session: XrSession;

    /// Whether any XR entry point exists.
    fn is_available(&self) -> bool;

    /// Whether `mode` can currently be entered.
    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool, PlatformError>;

    /// Negotiates a session.
    async fn request_session(&self, mode: SessionMode, init: &SessionInit) -> Result<Self::Session, PlatformError>;
}

/// A live engagement with the device sensors.
#[async_trait]
pub trait XrSession: Send + Sync + 'static {
    /// Frame type delivered each refresh.
    type Frame: XrFrame;

    /// Features the platform actually granted.
    fn enabled_features(&self) -> Vec<XrFeature>;

    /// Acquires a reference space.
    async fn request_reference_space(&self, kind: ReferenceSpaceType) -> Result<ReferenceSpaceId, PlatformError>;

    /// Creates a standing hit-test subscription casting rays from `space`.
    async fn request_hit_test_source(&self, space: ReferenceSpaceId) -> Result<HitTestSourceId, PlatformError>;

    /// Releases a hit-test subscription. Unknown ids are ignored.
    fn cancel_hit_test_source(&self, source: HitTestSourceId);

    /// Registers the end listener. Replaces any earlier listener.
    fn on_end(&self, listener: EndListener);

    /// Registers the select listener. Replaces any earlier listener.
    fn on_select(&self, listener: SelectListener);

    /// Waits for the next display refresh. `None` once the session has ended.
    async fn next_frame(&self) -> Option<Self::Frame>;

    /// Ends the session and releases the sensors.
    async fn end(&self) -> Result<(), PlatformError>;
}

/// Turns a model location into a renderable object.
#[async_trait]
pub trait ModelResolver: Send + Sync {
    /// Resolves `url`. No progress reporting beyond success or failure.
    async fn resolve(&self, url: &str) -> Result<Model, LoadError>;
}

/// Draws the scene graph. Called exactly once per frame tick.
pub trait Renderer: Send + 'static {
    /// Ties subsequent renders to the session's display timing.
    fn bind_session(&mut self, mode: SessionMode);

    /// Returns to non-session rendering.
    fn unbind_session(&mut self);

    /// Draws `scene` from `camera` for `frame`. Must not accumulate state.
    fn render(&mut self, scene: &SceneGraph, camera: &Camera, frame: FrameToken);
}
