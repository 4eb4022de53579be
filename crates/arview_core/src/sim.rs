//! # Simulated Platform
//!
//! Deterministic, in-process implementations of every external contract:
//! [`SimPlatform`] / [`SimSession`] / [`SimFrame`] for the XR platform,
//! [`SimRenderer`] and [`SimResolver`].
//!
//! Frames are pushed by the test (or demo) through a [`SimHub`], one at a
//! time. [`SimHub::advance`] returns once the frame loop has finished with
//! the frame, so assertions after it see the tick's effects.
//!
//! Scripted hits are given in the world-local space. Queries posed in the
//! viewer space get them shifted by the simulated device position.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use arview_shared::{FrameToken, RigidTransform, Vec3};

use crate::error::{LoadError, PlatformError};
use crate::platform::{
    EndListener, EndReason, HitTestSourceId, ModelResolver, ReferenceSpaceId, ReferenceSpaceType, Renderer,
    SelectListener, SessionInit, SessionMode, XrFeature, XrFrame, XrHitTestResult, XrSession, XrSystem,
};
use crate::scene::{Camera, Model, SceneGraph};

/// Id the simulator hands out for the viewer space.
pub const VIEWER_SPACE: ReferenceSpaceId = ReferenceSpaceId(1);
/// Id the simulator hands out for the local space.
pub const LOCAL_SPACE: ReferenceSpaceId = ReferenceSpaceId(2);

const ADVANCE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, Default)]
struct Failures {
    reject: Option<String>,
    withhold: Option<XrFeature>,
    space: Option<ReferenceSpaceType>,
    hit_source: Option<String>,
    stall_hit_source: bool,
    end_while_starting: bool,
}

#[derive(Default)]
struct HubState {
    frames: Option<mpsc::Sender<SimFrame>>,
    ended: bool,
    end_listener: Option<EndListener>,
    select_listener: Option<Arc<SelectListener>>,
    next_token: u64,
    next_source: u32,
    live_sources: Vec<HitTestSourceId>,
    viewer_position: Vec3,
    support_queries: u64,
    sessions_requested: u64,
    hit_queries: u64,
    cancelled_sources: u64,
    end_calls: u64,
}

/// Controller side of the simulator.
#[derive(Clone, Default)]
pub struct SimHub {
    inner: Arc<Mutex<HubState>>,
}

impl SimHub {
    /// Delivers one frame whose nearest hit (local space) is `hit`.
    ///
    /// Returns `true` once the frame loop has processed it, `false` when no
    /// live session is consuming frames.
    pub async fn advance(&self, hit: Option<RigidTransform>) -> bool {
        let (frames, frame, done) = {
            let mut state = self.inner.lock();
            let Some(frames) = state.frames.clone() else {
                return false;
            };
            state.next_token += 1;
            let (done_tx, done_rx) = oneshot::channel();
            let frame = SimFrame {
                token: FrameToken(state.next_token),
                hits: hit.map(|pose| XrHitTestResult::new(pose.to_cols_array())).into_iter().collect(),
                viewer_position: state.viewer_position,
                hub: Some(self.clone()),
                done: Some(done_tx),
            };
            (frames, frame, done_rx)
        };

        if frames.send(frame).await.is_err() {
            return false;
        }
        matches!(tokio::time::timeout(ADVANCE_TIMEOUT, done).await, Ok(Ok(())))
    }

    /// Moves the simulated device. Affects viewer-space hit poses only.
    pub fn set_viewer_position(&self, position: Vec3) {
        self.inner.lock().viewer_position = position;
    }

    /// The user (or system) leaves AR behind the viewer's back.
    pub fn end_out_of_band(&self) {
        self.end_session(EndReason::User);
    }

    /// Simulates a tap. Returns `false` without a registered listener.
    pub fn fire_select(&self) -> bool {
        let listener = self.inner.lock().select_listener.clone();
        match listener {
            Some(listener) => {
                listener(0);
                true
            }
            None => false,
        }
    }

    /// Whether the current session has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.lock().ended
    }

    /// Support queries answered.
    #[must_use]
    pub fn support_queries(&self) -> u64 {
        self.inner.lock().support_queries
    }

    /// Session requests received.
    #[must_use]
    pub fn sessions_requested(&self) -> u64 {
        self.inner.lock().sessions_requested
    }

    /// Hit-test result lookups made by frames.
    #[must_use]
    pub fn hit_queries(&self) -> u64 {
        self.inner.lock().hit_queries
    }

    /// Hit-test sources cancelled.
    #[must_use]
    pub fn cancelled_sources(&self) -> u64 {
        self.inner.lock().cancelled_sources
    }

    /// Hit-test sources still subscribed.
    #[must_use]
    pub fn live_sources(&self) -> usize {
        self.inner.lock().live_sources.len()
    }

    /// Calls to `XrSession::end`.
    #[must_use]
    pub fn end_calls(&self) -> u64 {
        self.inner.lock().end_calls
    }

    fn open_session(&self, frames: mpsc::Sender<SimFrame>) {
        let mut state = self.inner.lock();
        state.sessions_requested += 1;
        state.frames = Some(frames);
        state.ended = false;
        state.end_listener = None;
        state.select_listener = None;
    }

    /// Returns `false` if the session had already ended.
    fn end_session(&self, reason: EndReason) -> bool {
        let listener = {
            let mut state = self.inner.lock();
            if state.ended || state.frames.is_none() {
                return false;
            }
            state.ended = true;
            state.frames = None;
            state.select_listener = None;
            state.end_listener.take()
        };
        // Listeners run outside the hub lock; they may call back in.
        if let Some(listener) = listener {
            listener(reason);
        }
        true
    }

    fn open_source(&self) -> HitTestSourceId {
        let mut state = self.inner.lock();
        state.next_source += 1;
        let id = HitTestSourceId(state.next_source);
        state.live_sources.push(id);
        id
    }

    fn cancel_source(&self, source: HitTestSourceId) {
        let mut state = self.inner.lock();
        if let Some(at) = state.live_sources.iter().position(|s| *s == source) {
            state.live_sources.swap_remove(at);
            state.cancelled_sources += 1;
        }
    }

    fn record_hit_query(&self, source: HitTestSourceId) -> bool {
        let mut state = self.inner.lock();
        state.hit_queries += 1;
        state.live_sources.contains(&source)
    }
}

/// One simulated display refresh.
pub struct SimFrame {
    token: FrameToken,
    hits: Vec<XrHitTestResult>,
    viewer_position: Vec3,
    hub: Option<SimHub>,
    done: Option<oneshot::Sender<()>>,
}

impl SimFrame {
    /// A free-standing frame, not tied to any hub.
    #[must_use]
    pub fn scripted(token: u64, hit: Option<RigidTransform>) -> Self {
        Self {
            token: FrameToken(token),
            hits: hit.map(|pose| XrHitTestResult::new(pose.to_cols_array())).into_iter().collect(),
            viewer_position: Vec3::ZERO,
            hub: None,
            done: None,
        }
    }
}

impl XrFrame for SimFrame {
    fn token(&self) -> FrameToken {
        self.token
    }

    fn hit_test_results(&self, source: HitTestSourceId, base: ReferenceSpaceId) -> Vec<XrHitTestResult> {
        if let Some(hub) = &self.hub {
            if !hub.record_hit_query(source) {
                return Vec::new();
            }
        }
        if base != VIEWER_SPACE {
            return self.hits.clone();
        }
        self.hits
            .iter()
            .map(|hit| match hit.matrix() {
                Some(m) => {
                    let mut m = *m;
                    m[12] -= self.viewer_position.x;
                    m[13] -= self.viewer_position.y;
                    m[14] -= self.viewer_position.z;
                    XrHitTestResult::new(m)
                }
                None => *hit,
            })
            .collect()
    }
}

impl Drop for SimFrame {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Builder for [`SimPlatform`].
#[derive(Debug)]
pub struct SimPlatformBuilder {
    xr_available: bool,
    ar_supported: bool,
    probe_error: Option<String>,
    failures: Failures,
}

impl SimPlatformBuilder {
    /// No XR entry point at all.
    #[must_use]
    pub fn without_xr(mut self) -> Self {
        self.xr_available = false;
        self
    }

    /// XR exists but immersive AR is reported unavailable.
    #[must_use]
    pub fn ar_unsupported(mut self) -> Self {
        self.ar_supported = false;
        self
    }

    /// The support query itself fails.
    #[must_use]
    pub fn probe_error(mut self, reason: impl Into<String>) -> Self {
        self.probe_error = Some(reason.into());
        self
    }

    /// The session request is refused.
    #[must_use]
    pub fn reject_session(mut self, reason: impl Into<String>) -> Self {
        self.failures.reject = Some(reason.into());
        self
    }

    /// Sessions are granted without `feature`.
    #[must_use]
    pub fn withhold_feature(mut self, feature: XrFeature) -> Self {
        self.failures.withhold = Some(feature);
        self
    }

    /// Requests for `kind` fail.
    #[must_use]
    pub fn fail_space(mut self, kind: ReferenceSpaceType) -> Self {
        self.failures.space = Some(kind);
        self
    }

    /// Hit-test source creation fails.
    #[must_use]
    pub fn fail_hit_source(mut self, reason: impl Into<String>) -> Self {
        self.failures.hit_source = Some(reason.into());
        self
    }

    /// Hit-test source creation never completes.
    #[must_use]
    pub fn stall_hit_source(mut self) -> Self {
        self.failures.stall_hit_source = true;
        self
    }

    /// The user leaves AR while the hit-test source is being created.
    #[must_use]
    pub fn end_while_starting(mut self) -> Self {
        self.failures.end_while_starting = true;
        self
    }

    /// Builds the platform.
    #[must_use]
    pub fn build(self) -> SimPlatform {
        SimPlatform {
            hub: SimHub::default(),
            xr_available: self.xr_available,
            ar_supported: self.ar_supported,
            probe_error: self.probe_error,
            failures: self.failures,
        }
    }
}

/// Simulated XR entry point.
pub struct SimPlatform {
    hub: SimHub,
    xr_available: bool,
    ar_supported: bool,
    probe_error: Option<String>,
    failures: Failures,
}

impl SimPlatform {
    /// A platform where everything works.
    #[must_use]
    pub fn builder() -> SimPlatformBuilder {
        SimPlatformBuilder {
            xr_available: true,
            ar_supported: true,
            probe_error: None,
            failures: Failures::default(),
        }
    }

    /// Controller for frames, ends and selects.
    #[must_use]
    pub fn hub(&self) -> SimHub {
        self.hub.clone()
    }
}

#[async_trait]
impl XrSystem for SimPlatform {
    type Session = SimSession;

    fn is_available(&self) -> bool {
        self.xr_available
    }

    async fn is_session_supported(&self, mode: SessionMode) -> Result<bool, PlatformError> {
        self.hub.inner.lock().support_queries += 1;
        if let Some(reason) = &self.probe_error {
            return Err(PlatformError::new(reason.clone()));
        }
        Ok(mode == SessionMode::ImmersiveAr && self.ar_supported)
    }

    async fn request_session(&self, mode: SessionMode, init: &SessionInit) -> Result<SimSession, PlatformError> {
        if let Some(reason) = &self.failures.reject {
            self.hub.inner.lock().sessions_requested += 1;
            return Err(PlatformError::new(reason.clone()));
        }
        if mode != SessionMode::ImmersiveAr || !self.ar_supported {
            self.hub.inner.lock().sessions_requested += 1;
            return Err(PlatformError::new(format!("{} not supported", mode.as_str())));
        }

        let features = init
            .required_features
            .iter()
            .chain(&init.optional_features)
            .copied()
            .filter(|f| Some(*f) != self.failures.withhold)
            .collect();
        let (tx, rx) = mpsc::channel(1);
        self.hub.open_session(tx);

        Ok(SimSession {
            hub: self.hub.clone(),
            frames: tokio::sync::Mutex::new(rx),
            features,
            failures: self.failures.clone(),
        })
    }
}

/// Simulated session.
pub struct SimSession {
    hub: SimHub,
    frames: tokio::sync::Mutex<mpsc::Receiver<SimFrame>>,
    features: Vec<XrFeature>,
    failures: Failures,
}

#[async_trait]
impl XrSession for SimSession {
    type Frame = SimFrame;

    fn enabled_features(&self) -> Vec<XrFeature> {
        self.features.clone()
    }

    async fn request_reference_space(&self, kind: ReferenceSpaceType) -> Result<ReferenceSpaceId, PlatformError> {
        if self.failures.space == Some(kind) {
            return Err(PlatformError::new(format!("{kind:?} reference space unavailable")));
        }
        Ok(match kind {
            ReferenceSpaceType::Viewer => VIEWER_SPACE,
            ReferenceSpaceType::Local => LOCAL_SPACE,
        })
    }

    async fn request_hit_test_source(&self, _space: ReferenceSpaceId) -> Result<HitTestSourceId, PlatformError> {
        if self.failures.stall_hit_source {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = &self.failures.hit_source {
            return Err(PlatformError::new(reason.clone()));
        }
        if self.failures.end_while_starting {
            self.hub.end_out_of_band();
        }
        Ok(self.hub.open_source())
    }

    fn cancel_hit_test_source(&self, source: HitTestSourceId) {
        self.hub.cancel_source(source);
    }

    fn on_end(&self, listener: EndListener) {
        self.hub.inner.lock().end_listener = Some(listener);
    }

    fn on_select(&self, listener: SelectListener) {
        self.hub.inner.lock().select_listener = Some(Arc::new(listener));
    }

    async fn next_frame(&self) -> Option<SimFrame> {
        let mut frame = self.frames.lock().await.recv().await?;
        if self.hub.is_ended() {
            // Drop without acknowledging; `advance` reports it as undelivered.
            frame.done = None;
            return None;
        }
        Some(frame)
    }

    async fn end(&self) -> Result<(), PlatformError> {
        self.hub.inner.lock().end_calls += 1;
        if self.hub.end_session(EndReason::Requested) {
            Ok(())
        } else {
            Err(PlatformError::new("session already ended"))
        }
    }
}

/// What one render call saw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRecord {
    /// Frame rendered.
    pub frame: FrameToken,
    /// Indicator drawn.
    pub indicator_visible: bool,
    /// Indicator pose.
    pub indicator_transform: RigidTransform,
    /// Model drawn.
    pub model_visible: bool,
    /// Model pose.
    pub model_transform: RigidTransform,
}

#[derive(Debug, Default)]
struct RenderLog {
    count: u64,
    last: Option<RenderRecord>,
    history: Option<Vec<RenderRecord>>,
    bound: Option<SessionMode>,
    binds: u32,
}

/// Renderer that records what it was asked to draw. Clones share the log.
#[derive(Clone, Debug)]
pub struct SimRenderer {
    log: Arc<Mutex<RenderLog>>,
}

impl Default for SimRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRenderer {
    /// Records every render.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(RenderLog {
                history: Some(Vec::new()),
                ..RenderLog::default()
            })),
        }
    }

    /// Keeps only the count and the last render.
    #[must_use]
    pub fn without_history() -> Self {
        Self {
            log: Arc::new(Mutex::new(RenderLog::default())),
        }
    }

    /// Render calls so far.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.log.lock().count
    }

    /// The most recent render.
    #[must_use]
    pub fn last(&self) -> Option<RenderRecord> {
        self.log.lock().last
    }

    /// Every render, oldest first. Empty without history.
    #[must_use]
    pub fn history(&self) -> Vec<RenderRecord> {
        self.log.lock().history.clone().unwrap_or_default()
    }

    /// Whether the renderer is tied to a session.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.log.lock().bound.is_some()
    }

    /// Times `bind_session` was called.
    #[must_use]
    pub fn bind_count(&self) -> u32 {
        self.log.lock().binds
    }
}

impl Renderer for SimRenderer {
    fn bind_session(&mut self, mode: SessionMode) {
        let mut log = self.log.lock();
        log.bound = Some(mode);
        log.binds += 1;
    }

    fn unbind_session(&mut self) {
        self.log.lock().bound = None;
    }

    fn render(&mut self, scene: &SceneGraph, _camera: &Camera, frame: FrameToken) {
        let indicator = scene.indicator();
        let model = scene.model();
        let record = RenderRecord {
            frame,
            indicator_visible: indicator.is_some_and(|n| n.visible),
            indicator_transform: indicator.map_or(RigidTransform::IDENTITY, |n| n.transform),
            model_visible: model.is_some_and(|n| n.visible),
            model_transform: model.map_or(RigidTransform::IDENTITY, |n| n.transform),
        };

        let mut log = self.log.lock();
        log.count += 1;
        log.last = Some(record);
        if let Some(history) = log.history.as_mut() {
            history.push(record);
        }
    }
}

/// Payload of a simulated model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimModel {
    /// Where it was "loaded" from.
    pub url: String,
}

/// Model resolver with a fixed outcome.
#[derive(Debug)]
pub struct SimResolver {
    failure: Option<LoadError>,
    resolves: AtomicU32,
}

impl SimResolver {
    /// Resolves every url.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            failure: None,
            resolves: AtomicU32::new(0),
        }
    }

    /// Fails every url with `error`.
    #[must_use]
    pub const fn failing(error: LoadError) -> Self {
        Self {
            failure: Some(error),
            resolves: AtomicU32::new(0),
        }
    }

    /// Resolve calls so far.
    #[must_use]
    pub fn resolve_count(&self) -> u32 {
        self.resolves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelResolver for SimResolver {
    async fn resolve(&self, url: &str) -> Result<Model, LoadError> {
        self.resolves.fetch_add(1, Ordering::Relaxed);
        tokio::task::yield_now().await;
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(Model::new(url, SimModel { url: url.to_owned() })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_space_poses_follow_device() {
        let hub = SimHub::default();
        hub.set_viewer_position(Vec3::new(0.0, 1.5, 0.0));
        let source = hub.open_source();
        let hit = RigidTransform::from_translation(Vec3::new(0.0, 0.0, -2.0));
        let frame = SimFrame {
            token: FrameToken(1),
            hits: vec![XrHitTestResult::new(hit.to_cols_array())],
            viewer_position: Vec3::new(0.0, 1.5, 0.0),
            hub: Some(hub.clone()),
            done: None,
        };

        let local = frame.hit_test_results(source, LOCAL_SPACE);
        let viewer = frame.hit_test_results(source, VIEWER_SPACE);
        let pose = |r: &XrHitTestResult| r.matrix().map(RigidTransform::from_cols_array);
        assert_eq!(pose(&local[0]), Some(hit));
        assert_eq!(pose(&viewer[0]).map(|p| p.position), Some(Vec3::new(0.0, -1.5, -2.0)));
        assert_eq!(hub.hit_queries(), 2);
    }

    #[test]
    fn test_cancelled_source_sees_nothing() {
        let hub = SimHub::default();
        let source = hub.open_source();
        hub.cancel_source(source);
        let frame = SimFrame {
            token: FrameToken(1),
            hits: vec![XrHitTestResult::new(RigidTransform::IDENTITY.to_cols_array())],
            viewer_position: Vec3::ZERO,
            hub: Some(hub.clone()),
            done: None,
        };
        assert!(frame.hit_test_results(source, LOCAL_SPACE).is_empty());
        assert_eq!(hub.cancelled_sources(), 1);
    }

    #[tokio::test]
    async fn test_resolver_outcome_is_fixed() {
        let ok = SimResolver::ok();
        let model = ok.resolve("/models/sofa.glb").await.unwrap();
        assert_eq!(model.source(), "/models/sofa.glb");
        assert_eq!(ok.resolve_count(), 1);

        let failing = SimResolver::failing(LoadError::NotFound("/models/none.glb".into()));
        assert!(failing.resolve("/models/none.glb").await.is_err());
        assert!(failing.resolve("/models/none.glb").await.is_err());
        assert_eq!(failing.resolve_count(), 2);
    }

    #[tokio::test]
    async fn test_advance_without_session_is_undelivered() {
        let hub = SimHub::default();
        assert!(!hub.advance(None).await);
    }

    #[tokio::test]
    async fn test_end_runs_listener_once() {
        let platform = SimPlatform::builder().build();
        let session = platform
            .request_session(SessionMode::ImmersiveAr, &SessionInit::default())
            .await
            .unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&fired);
        session.on_end(Box::new(move |reason| {
            assert_eq!(reason, EndReason::Requested);
            seen.fetch_add(1, Ordering::Relaxed);
        }));

        assert!(session.end().await.is_ok());
        assert!(session.end().await.is_err());
        assert_eq!(fired.load(Ordering::Relaxed), 1);
        assert_eq!(platform.hub().end_calls(), 2);
        assert!(session.next_frame().await.is_none());
    }
}
