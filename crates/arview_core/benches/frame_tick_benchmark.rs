//! # Frame Tick Benchmark
//!
//! One refresh is 16.6ms at 60Hz. The placement path of a tick (hit query,
//! state machine, scene update, render call) must be a rounding error of that.
//!
//! Run with: `cargo bench --package arview_core`

#![allow(missing_docs)]
#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arview_core::sim::{SimFrame, SimRenderer};
use arview_core::{
    Camera, HemisphereLight, HitResult, HitTestEngine, IndicatorStyle, Model, PlacementStateMachine, Renderer,
    SceneGraph, XrFrame,
};
use arview_core::{FrameToken, HitTestSource, ReferenceSpaces, RigidTransform, SourceSlots, Vec3};

fn scene() -> SceneGraph {
    let mut scene = SceneGraph::with_defaults(Camera::default(), HemisphereLight::default(), IndicatorStyle::default());
    scene.attach_model(Model::new("/models/sofa.glb", ()));
    scene
}

fn source() -> HitTestSource {
    // Sources are only minted by a session; borrow one from a scripted setup.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    runtime.block_on(async {
        use arview_core::sim::SimPlatform;
        use arview_core::{ReferenceSpaceType, SessionMode, XrSession, XrSystem};

        let platform = SimPlatform::builder().build();
        let session = platform
            .request_session(SessionMode::ImmersiveAr, &Default::default())
            .await
            .expect("session");
        let spaces = ReferenceSpaces {
            viewer: session
                .request_reference_space(ReferenceSpaceType::Viewer)
                .await
                .expect("viewer space"),
            local: session
                .request_reference_space(ReferenceSpaceType::Local)
                .await
                .expect("local space"),
        };
        HitTestEngine::create_source(&session, spaces).await.expect("hit-test source")
    })
}

/// Benchmark: a searching tick with a hit under the ray.
fn bench_searching_tick(c: &mut Criterion) {
    let source = source();
    let mut slots = SourceSlots::new();
    let handle = slots.insert(source);
    let mut engine = HitTestEngine::new();
    let mut machine = PlacementStateMachine::new();
    let mut scene = scene();
    let mut renderer = SimRenderer::without_history();
    let camera = Camera::default();
    let hit = RigidTransform::from_translation(Vec3::new(0.0, -1.2, -2.0));

    let mut token = 0u64;
    c.bench_function("searching_tick", |b| {
        b.iter(|| {
            token += 1;
            let frame = SimFrame::scripted(token, Some(hit));
            let result = engine.query(&frame, &slots, handle).ok().flatten();
            machine.on_frame(black_box(result));
            scene.apply(&machine.visuals());
            renderer.render(&scene, &camera, frame.token());
        });
    });
}

/// Benchmark: the select path re-querying inside the same frame.
fn bench_select_memo(c: &mut Criterion) {
    let source = source();
    let mut engine = HitTestEngine::new();
    let frame = SimFrame::scripted(1, Some(RigidTransform::IDENTITY));
    engine.query_source(&frame, &source);

    c.bench_function("same_frame_requery", |b| {
        b.iter(|| black_box(engine.query_source(&frame, &source)));
    });
}

/// Benchmark: a placed tick, which skips hit testing entirely.
fn bench_placed_tick(c: &mut Criterion) {
    let mut machine = PlacementStateMachine::new();
    machine.on_select(|| {
        Some(HitResult {
            transform: RigidTransform::IDENTITY,
            frame: FrameToken(0),
        })
    });
    let mut scene = scene();
    let mut renderer = SimRenderer::without_history();
    let camera = Camera::default();

    let mut token = 0u64;
    c.bench_function("placed_tick", |b| {
        b.iter(|| {
            token += 1;
            scene.apply(&machine.visuals());
            renderer.render(&scene, &camera, FrameToken(token));
        });
    });
}

criterion_group!(benches, bench_searching_tick, bench_select_memo, bench_placed_tick);
criterion_main!(benches);
