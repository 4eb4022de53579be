//! # Session Manager
//!
//! Sole owner of the platform session and its hit-test source.
//!
//! ## Start
//!
//! ```text
//! request_session ─▶ check granted features ─▶ viewer + local spaces (joined)
//!        ─▶ hit-test source ─▶ select listener ─▶ bind renderer ─▶ Active
//! ```
//!
//! The end listener goes on right after `request_session`; a session that
//! ends before the start completes fails it with [`SessionError::Ended`].
//!
//! Every step may fail. A [`StartGuard`] tracks what has been acquired so far
//! and releases it on failure, and also when the `start` future is dropped
//! half way (cancellation).
//!
//! ## Stop
//!
//! Detach the frame loop, release the hit-test source, end the session.
//! Idempotent: a second call, or a call after the platform already ended the
//! session, does nothing.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ViewerConfig;
use crate::error::{SessionError, SessionResult};
use crate::frame_loop::{FrameLoop, FrameLoopReport, FrameStats, LoopWiring, SelectEvent};
use crate::hit_test::{HitTestEngine, HitTestHandle, HitTestSource, ReferenceSpaces, SourceSlots};
use crate::platform::{EndReason, HitTestSourceId, ReferenceSpaceType, Renderer, SessionInit, SessionMode, XrSession, XrSystem};
use crate::scene::SceneGraph;
use crate::status::{SessionLifecycle, SharedViewState};

/// Releases partially acquired session resources unless disarmed.
struct StartGuard<S: XrSession> {
    session: Option<Arc<S>>,
    source: Option<HitTestSourceId>,
}

impl<S: XrSession> StartGuard<S> {
    fn new(session: Arc<S>) -> Self {
        Self {
            session: Some(session),
            source: None,
        }
    }

    /// Explicit failure path: tear down and wait for the platform.
    async fn abort(mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(source) = self.source.take() {
            session.cancel_hit_test_source(source);
        }
        if let Err(e) = session.end().await {
            tracing::warn!("Failed to end half-started session: {}", e);
        }
    }

    /// Start succeeded; ownership moves to the manager.
    fn disarm(mut self) {
        self.session = None;
        self.source = None;
    }
}

impl<S: XrSession> Drop for StartGuard<S> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        tracing::debug!("Session start cancelled; releasing partial resources");
        if let Some(source) = self.source.take() {
            session.cancel_hit_test_source(source);
        }
        // No await in drop; hand the end call to the runtime if there is one.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = session.end().await {
                    tracing::warn!("Failed to end cancelled session: {}", e);
                }
            });
        }
    }
}

struct LoopTask {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<FrameLoopReport>,
}

/// Owns one session from negotiation to teardown.
pub struct SessionManager<S: XrSession> {
    state: SharedViewState,
    session: Option<Arc<S>>,
    spaces: Option<ReferenceSpaces>,
    slots: Arc<Mutex<SourceSlots>>,
    handle: Option<HitTestHandle>,
    selects_tx: Sender<SelectEvent>,
    selects_rx: Receiver<SelectEvent>,
    frame_loop: Option<LoopTask>,
    stats: Arc<Mutex<FrameStats>>,
    last_report: Option<FrameLoopReport>,
    started: bool,
}

impl<S: XrSession> SessionManager<S> {
    /// Creates an idle manager reporting into `state`.
    #[must_use]
    pub fn new(state: SharedViewState, config: &ViewerConfig) -> Self {
        let (selects_tx, selects_rx) = bounded(config.select_queue.max(1));
        Self {
            state,
            session: None,
            spaces: None,
            slots: Arc::new(Mutex::new(SourceSlots::new())),
            handle: None,
            selects_tx,
            selects_rx,
            frame_loop: None,
            stats: Arc::new(Mutex::new(FrameStats::default())),
            last_report: None,
            started: false,
        }
    }

    /// Negotiates an immersive AR session and prepares hit testing.
    ///
    /// The renderer is bound last, so a failed start never leaves it tied to
    /// a dead session. A manager starts at most once.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyStarted`] on a second call
    /// - [`SessionError::Rejected`] if the platform refuses the session
    /// - [`SessionError::FeatureNotGranted`] if a required feature is missing
    /// - [`SessionError::ReferenceSpace`] if either reference space fails
    /// - [`SessionError::HitTest`] if the hit-test source cannot be created
    /// - [`SessionError::Ended`] if the session ended while starting
    pub async fn start<P, R>(&mut self, platform: &P, renderer: &mut R, init: &SessionInit) -> SessionResult<()>
    where
        P: XrSystem<Session = S>,
        R: Renderer,
    {
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }
        self.started = true;

        let init = &init.clone().with_viewer_features();
        let session = platform
            .request_session(SessionMode::ImmersiveAr, init)
            .await
            .map_err(SessionError::Rejected)?;
        let session = Arc::new(session);
        let mut guard = StartGuard::new(Arc::clone(&session));

        // Listen before negotiating: the user may leave while spaces and the
        // hit-test source are still being acquired.
        let state = Arc::clone(&self.state);
        session.on_end(Box::new(move |reason| {
            tracing::info!("AR session ended ({:?})", reason);
            // Requested ends come from `stop`, which settles the lifecycle
            // itself, or from a failed start, which leaves it inactive.
            if reason != EndReason::Requested {
                state.lock().session_ended();
            }
        }));

        let negotiated = match Self::negotiate(&session, init, &mut guard).await {
            Ok(_) if self.state.lock().lifecycle() == SessionLifecycle::Ended => Err(SessionError::Ended),
            other => other,
        };
        let (spaces, source) = match negotiated {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!("Session start failed: {}", e);
                guard.abort().await;
                return Err(e);
            }
        };

        let selects = self.selects_tx.clone();
        session.on_select(Box::new(move |input| {
            if selects.try_send(SelectEvent { input }).is_err() {
                tracing::debug!("Select from input {} dropped", input);
            }
        }));

        renderer.bind_session(SessionMode::ImmersiveAr);
        self.handle = Some(self.slots.lock().insert(source));
        self.spaces = Some(spaces);
        self.session = Some(session);
        guard.disarm();

        self.state.lock().session_started();
        tracing::info!("AR session started");
        Ok(())
    }

    async fn negotiate(
        session: &Arc<S>,
        init: &SessionInit,
        guard: &mut StartGuard<S>,
    ) -> SessionResult<(ReferenceSpaces, HitTestSource)> {
        let granted = session.enabled_features();
        if let Some(missing) = init.required_features.iter().find(|f| !granted.contains(f)) {
            return Err(SessionError::FeatureNotGranted(*missing));
        }

        let (viewer, local) = tokio::try_join!(
            session.request_reference_space(ReferenceSpaceType::Viewer),
            session.request_reference_space(ReferenceSpaceType::Local),
        )
        .map_err(SessionError::ReferenceSpace)?;
        tracing::debug!("Reference spaces acquired: viewer {:?}, local {:?}", viewer, local);

        let spaces = ReferenceSpaces { viewer, local };
        let source = HitTestEngine::create_source(session.as_ref(), spaces).await?;
        guard.source = Some(source.id());
        Ok((spaces, source))
    }

    /// Spawns the frame loop. Takes ownership of the renderer and scene.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotActive`] without a started session,
    /// [`SessionError::AlreadyStarted`] if a loop is already attached.
    pub fn run_frame_loop<R: Renderer>(&mut self, renderer: R, scene: SceneGraph, config: &ViewerConfig) -> SessionResult<()> {
        let (Some(session), Some(handle)) = (&self.session, self.handle) else {
            return Err(SessionError::NotActive);
        };
        if self.frame_loop.is_some() || self.last_report.is_some() {
            return Err(SessionError::AlreadyStarted);
        }

        let wiring = LoopWiring {
            slots: Arc::clone(&self.slots),
            handle,
            state: Arc::clone(&self.state),
            selects: self.selects_rx.clone(),
            stats: Arc::clone(&self.stats),
        };
        let frame_loop = FrameLoop::new(Arc::clone(session), renderer, scene, wiring, config);
        let (shutdown, signal) = oneshot::channel();
        let join = tokio::spawn(frame_loop.run(signal));
        self.frame_loop = Some(LoopTask { shutdown, join });
        Ok(())
    }

    /// Tears the session down. Safe to call any number of times.
    pub async fn stop(&mut self) {
        if let Some(task) = self.frame_loop.take() {
            // The loop may already have exited on its own; a closed channel is fine.
            let _ = task.shutdown.send(());
            match task.join.await {
                Ok(report) => self.last_report = Some(report),
                Err(e) => tracing::warn!("Frame loop task failed: {}", e),
            }
        }

        if let Some(handle) = self.handle.take() {
            let released = self.slots.lock().release(handle);
            match (released, &self.session) {
                (Ok(source), Some(session)) => session.cancel_hit_test_source(source.id()),
                (Ok(_), None) => {}
                (Err(e), _) => tracing::warn!("Hit-test source already released: {}", e),
            }
        }

        let Some(session) = self.session.take() else {
            return;
        };
        let ended_by_platform = self.state.lock().lifecycle() == SessionLifecycle::Ended;
        if !ended_by_platform {
            if let Err(e) = session.end().await {
                tracing::warn!("Session end failed: {}", e);
            }
        }
        self.state.lock().session_ended();
        tracing::debug!("Session torn down");
    }

    /// Queue feeding selects to the frame loop.
    #[must_use]
    pub fn select_sender(&self) -> Sender<SelectEvent> {
        self.selects_tx.clone()
    }

    /// Reference spaces of the live session.
    #[must_use]
    pub const fn spaces(&self) -> Option<ReferenceSpaces> {
        self.spaces
    }

    /// Handle of the live hit-test source.
    #[must_use]
    pub const fn hit_test_handle(&self) -> Option<HitTestHandle> {
        self.handle
    }

    /// Resolves `handle` against the sources this manager owns.
    ///
    /// # Errors
    ///
    /// [`crate::error::HitTestError::InvalidHandle`] once released.
    pub fn resolve_source(&self, handle: HitTestHandle) -> Result<HitTestSource, crate::error::HitTestError> {
        self.slots.lock().get(handle).copied()
    }

    /// Latest frame counters.
    #[must_use]
    pub fn frame_stats(&self) -> FrameStats {
        *self.stats.lock()
    }

    /// How the frame loop finished, once stopped.
    #[must_use]
    pub const fn last_report(&self) -> Option<&FrameLoopReport> {
        self.last_report.as_ref()
    }

    /// Whether a frame loop is attached.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.frame_loop.is_some()
    }
}

impl<S: XrSession> Drop for SessionManager<S> {
    fn drop(&mut self) {
        if let Some(task) = self.frame_loop.take() {
            let _ = task.shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let (Ok(source), Some(session)) = (self.slots.lock().release(handle), &self.session) {
                session.cancel_hit_test_source(source.id());
            }
        }
        let Some(session) = self.session.take() else {
            return;
        };
        let ended = self.state.lock().lifecycle() == SessionLifecycle::Ended;
        if !ended {
            self.state.lock().session_ended();
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move {
                    if let Err(e) = session.end().await {
                        tracing::warn!("Session end on drop failed: {}", e);
                    }
                });
            }
        }
    }
}
