//! # AR Viewer
//!
//! Wires the pipeline together for one product view:
//!
//! ```text
//! probe ──▶ renderer + scene ──▶ resolve model ──▶ start session ──▶ frame loop
//!   │
//!   └─ unsupported: stop here, nothing allocated
//! ```
//!
//! Every failure lands in the shared view state as the single terminal error
//! and is also returned to the caller. Nothing is retried.

use std::future::Future;
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use tokio::sync::watch;

use crate::capability::CapabilityProbe;
use crate::config::ViewerConfig;
use crate::error::{SessionError, SessionResult, ViewerError, ViewerResult};
use crate::frame_loop::{FrameLoopReport, FrameStats, SelectEvent};
use crate::platform::{ModelResolver, Renderer, XrSession, XrSystem};
use crate::scene::SceneGraph;
use crate::status::{LoadState, SessionLifecycle, SharedViewState, ViewState, ViewerStatus};

/// Read-only view of the status, usable before and after launch.
#[derive(Clone, Debug)]
pub struct StatusHandle {
    state: SharedViewState,
}

impl StatusHandle {
    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ViewerStatus {
        self.state.lock().snapshot()
    }
}

/// Aborts a launch in progress.
#[derive(Clone, Debug)]
pub struct ViewerCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl ViewerCanceller {
    /// Cancels the launch. Partially acquired session resources are released.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// One AR product view, before launch.
pub struct ArViewer<P: XrSystem, M: ModelResolver> {
    platform: P,
    resolver: M,
    config: ViewerConfig,
    state: SharedViewState,
    cancel: Arc<watch::Sender<bool>>,
}

impl<P: XrSystem, M: ModelResolver> ArViewer<P, M> {
    /// Creates a viewer. Nothing touches the platform until [`Self::launch`].
    #[must_use]
    pub fn new(platform: P, resolver: M, config: ViewerConfig) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            platform,
            resolver,
            config,
            state: ViewState::shared(),
            cancel: Arc::new(cancel),
        }
    }

    /// Status view that outlives the viewer.
    #[must_use]
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Handle to abort [`Self::launch`].
    #[must_use]
    pub fn canceller(&self) -> ViewerCanceller {
        ViewerCanceller {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Runs the pipeline up to a live frame loop.
    ///
    /// `make_renderer` is only called once the capability probe has passed.
    ///
    /// # Errors
    ///
    /// The terminal [`ViewerError`], also recorded in the status.
    pub async fn launch<R, F>(self, model_url: &str, make_renderer: F) -> ViewerResult<ViewerHandle<P::Session>>
    where
        R: Renderer,
        F: FnOnce() -> R,
    {
        let result = self.try_launch(model_url, make_renderer).await;
        if let Err(e) = &result {
            self.state.lock().fail(e.clone());
        }
        result
    }

    async fn try_launch<R, F>(&self, model_url: &str, make_renderer: F) -> ViewerResult<ViewerHandle<P::Session>>
    where
        R: Renderer,
        F: FnOnce() -> R,
    {
        let capability = self.until_cancelled(CapabilityProbe::new(&self.platform).probe()).await?;
        self.state.lock().set_capability(capability.clone());
        capability.into_result()?;

        let mut renderer = make_renderer();
        let mut scene = SceneGraph::with_defaults(self.config.camera, self.config.light, self.config.indicator);

        self.state.lock().set_load(LoadState::Loading);
        tracing::info!("Loading model {}", model_url);
        match self.until_cancelled(self.resolver.resolve(model_url)).await? {
            Ok(model) => {
                scene.attach_model(model);
                self.state.lock().set_load(LoadState::Loaded);
                tracing::info!("Model {} loaded", model_url);
            }
            Err(e) => {
                self.state.lock().set_load(LoadState::Failed);
                tracing::warn!("Model {} failed to load: {}", model_url, e);
                return Err(e.into());
            }
        }

        let mut manager = crate::session::SessionManager::new(Arc::clone(&self.state), &self.config);
        let init = self.config.session_init();
        self.until_cancelled(manager.start(&self.platform, &mut renderer, &init))
            .await??;
        manager.run_frame_loop(renderer, scene, &self.config)?;

        Ok(ViewerHandle {
            selects: manager.select_sender(),
            manager,
            state: Arc::clone(&self.state),
        })
    }

    async fn until_cancelled<T>(&self, step: impl Future<Output = T>) -> ViewerResult<T> {
        let mut cancelled = self.cancel.subscribe();
        tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => {
                tracing::info!("Launch cancelled");
                Err(ViewerError::Session(SessionError::Cancelled))
            }
            out = step => Ok(out),
        }
    }
}

/// A launched view with a running frame loop.
pub struct ViewerHandle<S: XrSession> {
    manager: crate::session::SessionManager<S>,
    state: SharedViewState,
    selects: Sender<SelectEvent>,
}

impl<S: XrSession> ViewerHandle<S> {
    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> ViewerStatus {
        self.state.lock().snapshot()
    }

    /// Whether the model has been placed.
    #[must_use]
    pub fn is_placed(&self) -> bool {
        self.state.lock().placement().is_placed()
    }

    /// Queues a select for the next tick.
    ///
    /// # Errors
    ///
    /// [`SessionError::Ended`] once the session is over.
    pub fn select(&self) -> SessionResult<()> {
        match self.state.lock().lifecycle() {
            SessionLifecycle::Active => {}
            SessionLifecycle::Ended => return Err(SessionError::Ended),
            SessionLifecycle::Inactive => return Err(SessionError::NotActive),
        }
        match self.selects.try_send(SelectEvent { input: 0 }) {
            // a full queue already holds a select for the next tick
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(SessionError::Ended),
        }
    }

    /// Frame counters so far.
    #[must_use]
    pub fn frame_stats(&self) -> FrameStats {
        self.manager.frame_stats()
    }

    /// How the frame loop finished, after [`Self::stop`].
    #[must_use]
    pub const fn last_report(&self) -> Option<&FrameLoopReport> {
        self.manager.last_report()
    }

    /// Ends the view. Idempotent.
    pub async fn stop(&mut self) {
        self.manager.stop().await;
    }
}
