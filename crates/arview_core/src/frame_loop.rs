//! # Frame Loop
//!
//! One dedicated task per session, woken by the platform once per display
//! refresh. Ticks never overlap.
//!
//! ## Tick Order
//!
//! ```text
//! 1. Resolve the hit-test handle (fails once the source is released)
//! 2. Lock the view state
//!    a. Pending selects → on_select with a fresh query against this frame
//!    b. Still searching  → query → on_frame
//!    c. Copy the placement visuals out
//! 3. Unlock
//! 4. Apply visuals to the scene graph
//! 5. Render exactly once
//! ```
//!
//! Selects queue on a channel between ticks and are drained at the start of
//! the next tick, so they never observe a half-updated state. Several selects
//! in one interval collapse into one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::config::ViewerConfig;
use crate::error::HitTestError;
use crate::hit_test::{HitTestEngine, HitTestHandle, SourceSlots};
use crate::placement::PlacementOutcome;
use crate::platform::{Renderer, XrFrame, XrSession};
use crate::scene::{Camera, SceneGraph};
use crate::status::SharedViewState;

/// A select (tap / trigger) waiting for the next tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectEvent {
    /// Input source index reported by the platform.
    pub input: u32,
}

/// Frame loop counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Ticks rendered.
    pub ticks: u64,
    /// Selects drained from the queue.
    pub selects: u64,
    /// Times the platform was asked for hits.
    pub hit_queries: u64,
    /// Platform queries that found a surface.
    pub hits: u64,
    /// Ticks slower than the budget.
    pub over_budget: u64,
    /// Slowest tick seen.
    pub worst_tick_us: u64,
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// The scene was rendered.
    Rendered {
        /// What placement did this tick.
        placement: PlacementOutcome,
    },
    /// The session has ended; nothing was rendered.
    Halted,
}

/// Why the loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameLoopExit {
    /// Detached by the session manager.
    Stopped,
    /// The session ended; no more frames.
    SessionEnded,
    /// A tick failed.
    Fault(HitTestError),
}

/// Final word from a finished loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameLoopReport {
    /// Why it stopped.
    pub exit: FrameLoopExit,
    /// Counters at exit.
    pub stats: FrameStats,
}

/// What the session manager hands the loop.
pub(crate) struct LoopWiring {
    pub(crate) slots: Arc<Mutex<SourceSlots>>,
    pub(crate) handle: HitTestHandle,
    pub(crate) state: SharedViewState,
    pub(crate) selects: Receiver<SelectEvent>,
    pub(crate) stats: Arc<Mutex<FrameStats>>,
}

/// The per-session frame loop.
pub struct FrameLoop<S: XrSession, R: Renderer> {
    session: Arc<S>,
    renderer: R,
    engine: HitTestEngine,
    slots: Arc<Mutex<SourceSlots>>,
    handle: HitTestHandle,
    state: SharedViewState,
    selects: Receiver<SelectEvent>,
    scene: SceneGraph,
    camera: Camera,
    budget: Duration,
    stats: FrameStats,
    published: Arc<Mutex<FrameStats>>,
}

impl<S: XrSession, R: Renderer> FrameLoop<S, R> {
    pub(crate) fn new(session: Arc<S>, renderer: R, scene: SceneGraph, wiring: LoopWiring, config: &ViewerConfig) -> Self {
        Self {
            session,
            renderer,
            engine: HitTestEngine::new(),
            slots: wiring.slots,
            handle: wiring.handle,
            state: wiring.state,
            selects: wiring.selects,
            scene,
            camera: config.camera,
            budget: config.frame_budget(),
            stats: FrameStats::default(),
            published: wiring.stats,
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Runs one tick against `frame`.
    ///
    /// # Errors
    ///
    /// [`HitTestError::InvalidHandle`] if the hit-test source was released
    /// while the loop was still attached. Nothing is rendered in that case.
    pub fn tick(&mut self, frame: &S::Frame) -> Result<TickOutcome, HitTestError> {
        let started = Instant::now();
        let source = *self.slots.lock().get(self.handle)?;
        let token = frame.token();
        let pending = self.selects.try_iter().count();

        let (placement, visuals) = {
            let mut state = self.state.lock();
            let machine = state.placement_mut();
            if machine.is_halted() {
                return Ok(TickOutcome::Halted);
            }

            let engine = &mut self.engine;
            let mut outcome = PlacementOutcome::Ignored;
            if pending > 0 {
                outcome = machine.on_select(|| engine.query_source(frame, &source));
            }
            if !machine.is_placed() {
                let hit = engine.query_source(frame, &source);
                outcome = machine.on_frame(hit);
            }
            (outcome, machine.visuals())
        };

        self.scene.apply(&visuals);
        self.renderer.render(&self.scene, &self.camera, token);

        let hit_stats = self.engine.stats();
        self.stats.ticks += 1;
        self.stats.selects += pending as u64;
        self.stats.hit_queries = hit_stats.platform_queries;
        self.stats.hits = hit_stats.hits;

        let elapsed = started.elapsed();
        let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.stats.worst_tick_us = self.stats.worst_tick_us.max(elapsed_us);
        if elapsed > self.budget {
            self.stats.over_budget += 1;
            tracing::warn!(
                "Tick {} took {}us (budget {}us)",
                token,
                elapsed_us,
                self.budget.as_micros()
            );
        }
        *self.published.lock() = self.stats;

        Ok(TickOutcome::Rendered { placement })
    }

    /// Drives ticks until `shutdown` fires or the session runs out of frames.
    ///
    /// The renderer is unbound from the session on every exit path.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> FrameLoopReport {
        tracing::debug!("Frame loop started");

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break FrameLoopExit::Stopped,
                next = self.session.next_frame() => next,
            };
            let Some(frame) = next else {
                break FrameLoopExit::SessionEnded;
            };

            match self.tick(&frame) {
                Ok(TickOutcome::Rendered { .. }) => {}
                Ok(TickOutcome::Halted) => break FrameLoopExit::SessionEnded,
                Err(e) => {
                    tracing::warn!("Frame loop fault: {}", e);
                    break FrameLoopExit::Fault(e);
                }
            }
        };

        if exit == FrameLoopExit::SessionEnded {
            self.state.lock().session_ended();
        }
        self.renderer.unbind_session();
        tracing::debug!("Frame loop exited after {} ticks: {:?}", self.stats.ticks, exit);
        FrameLoopReport {
            exit,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hit_test::{HitTestEngine, ReferenceSpaces};
    use crate::platform::{ReferenceSpaceType, SessionMode, XrSystem};
    use crate::sim::{SimFrame, SimHub, SimPlatform, SimRenderer, SimSession};
    use crate::status::{SessionLifecycle, ViewState};
    use arview_shared::{RigidTransform, Vec3};
    use crossbeam_channel::{bounded, Sender};

    struct Rig {
        frame_loop: FrameLoop<SimSession, SimRenderer>,
        renderer: SimRenderer,
        slots: Arc<Mutex<SourceSlots>>,
        handle: HitTestHandle,
        selects: Sender<SelectEvent>,
        state: SharedViewState,
        hub: SimHub,
    }

    async fn rig() -> Rig {
        let platform = SimPlatform::builder().build();
        let config = ViewerConfig::default();
        let session = platform
            .request_session(SessionMode::ImmersiveAr, &config.session_init())
            .await
            .map(Arc::new)
            .unwrap();
        let spaces = ReferenceSpaces {
            viewer: session.request_reference_space(ReferenceSpaceType::Viewer).await.unwrap(),
            local: session.request_reference_space(ReferenceSpaceType::Local).await.unwrap(),
        };
        let source = HitTestEngine::create_source(session.as_ref(), spaces).await.unwrap();

        let slots = Arc::new(Mutex::new(SourceSlots::new()));
        let handle = slots.lock().insert(source);
        let (tx, rx) = bounded(4);
        let state = ViewState::shared();
        let renderer = SimRenderer::new();
        let scene = SceneGraph::with_defaults(config.camera, config.light, config.indicator);
        let wiring = LoopWiring {
            slots: Arc::clone(&slots),
            handle,
            state: Arc::clone(&state),
            selects: rx,
            stats: Arc::new(Mutex::new(FrameStats::default())),
        };

        Rig {
            frame_loop: FrameLoop::new(session, renderer.clone(), scene, wiring, &config),
            renderer,
            slots,
            handle,
            selects: tx,
            state,
            hub: platform.hub(),
        }
    }

    fn at(x: f32) -> RigidTransform {
        RigidTransform::from_translation(Vec3::new(x, -1.0, -2.0))
    }

    #[tokio::test]
    async fn test_every_tick_renders_once() {
        let mut rig = rig().await;
        for token in 1..=3 {
            let outcome = rig.frame_loop.tick(&SimFrame::scripted(token, None)).unwrap();
            assert_eq!(
                outcome,
                TickOutcome::Rendered {
                    placement: PlacementOutcome::IndicatorHidden
                }
            );
        }
        assert_eq!(rig.renderer.render_count(), 3);
        assert_eq!(rig.frame_loop.stats().ticks, 3);
    }

    #[tokio::test]
    async fn test_select_queries_its_own_frame() {
        let mut rig = rig().await;
        rig.frame_loop.tick(&SimFrame::scripted(1, Some(at(1.0)))).unwrap();

        rig.selects.send(SelectEvent { input: 0 }).unwrap();
        rig.selects.send(SelectEvent { input: 0 }).unwrap();
        let outcome = rig.frame_loop.tick(&SimFrame::scripted(2, Some(at(2.0)))).unwrap();

        assert_eq!(
            outcome,
            TickOutcome::Rendered {
                placement: PlacementOutcome::Placed(at(2.0))
            }
        );
        let last = rig.renderer.last().unwrap();
        assert!(last.model_visible);
        assert!(!last.indicator_visible);
        assert_eq!(last.model_transform, at(2.0));
        assert_eq!(rig.frame_loop.stats().selects, 2);
        // one platform query per tick
        assert_eq!(rig.frame_loop.stats().hit_queries, 2);
    }

    #[tokio::test]
    async fn test_placed_ticks_skip_hit_testing() {
        let mut rig = rig().await;
        rig.selects.send(SelectEvent { input: 0 }).unwrap();
        rig.frame_loop.tick(&SimFrame::scripted(1, Some(at(1.0)))).unwrap();
        let queries = rig.frame_loop.stats().hit_queries;

        rig.frame_loop.tick(&SimFrame::scripted(2, Some(at(5.0)))).unwrap();
        assert_eq!(rig.frame_loop.stats().hit_queries, queries);
        assert_eq!(rig.renderer.last().map(|r| r.model_transform), Some(at(1.0)));
    }

    #[tokio::test]
    async fn test_released_source_faults_without_rendering() {
        let mut rig = rig().await;
        rig.slots.lock().release(rig.handle).unwrap();

        let err = rig.frame_loop.tick(&SimFrame::scripted(1, Some(at(1.0)))).unwrap_err();
        assert!(matches!(err, HitTestError::InvalidHandle { .. }));
        assert_eq!(rig.renderer.render_count(), 0);
    }

    #[tokio::test]
    async fn test_halted_state_stops_rendering() {
        let mut rig = rig().await;
        rig.state.lock().session_ended();

        let outcome = rig.frame_loop.tick(&SimFrame::scripted(1, Some(at(1.0)))).unwrap();
        assert_eq!(outcome, TickOutcome::Halted);
        assert_eq!(rig.renderer.render_count(), 0);
    }

    #[tokio::test]
    async fn test_platform_end_settles_view_state() {
        let rig = rig().await;
        let (_shutdown, signal) = oneshot::channel();
        rig.hub.end_out_of_band();

        let report = rig.frame_loop.run(signal).await;
        assert_eq!(report.exit, FrameLoopExit::SessionEnded);
        assert_eq!(rig.state.lock().lifecycle(), SessionLifecycle::Ended);
        assert!(rig.state.lock().placement().is_halted());
    }

    #[tokio::test]
    async fn test_zero_budget_counts_every_tick_late() {
        let mut rig = rig().await;
        rig.frame_loop.budget = Duration::ZERO;
        rig.frame_loop.tick(&SimFrame::scripted(1, None)).unwrap();
        rig.frame_loop.tick(&SimFrame::scripted(2, None)).unwrap();
        assert_eq!(rig.frame_loop.stats().over_budget, 2);
        assert_eq!(rig.renderer.render_count(), 2);
    }
}
