//! # ARVIEW Demo
//!
//! Runs the whole product-viewer flow against the simulated platform:
//!
//! 1. Load config and catalog
//! 2. Open the product page
//! 3. Probe, load model, start session
//! 4. Feed frames: no surface, then a surface
//! 5. Tap, place, keep rendering
//! 6. Stop
//!
//! Run with: `RUST_LOG=debug cargo run --bin arview_demo -- --product 2`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arview::{AppConfig, AppError, ProductPage};
use arview_core::sim::{SimPlatform, SimRenderer, SimResolver};
use arview_core::{ArViewer, RigidTransform, Vec3, ERROR_HINT};

#[derive(Parser, Debug)]
#[command(name = "arview_demo")]
#[command(about = "Place a catalog product on a simulated surface")]
struct Cli {
    /// Config file; missing means defaults.
    #[arg(short, long, default_value = "arview.toml")]
    config: PathBuf,

    /// Product id to view.
    #[arg(short, long, default_value = "1")]
    product: String,

    /// Frames with no surface under the ray before one appears.
    #[arg(long, default_value_t = 3)]
    search_frames: u32,

    /// Frames rendered after placement.
    #[arg(long, default_value_t = 3)]
    placed_frames: u32,

    /// Simulate a device without immersive AR.
    #[arg(long)]
    no_ar: bool,

    /// End the session from the platform side instead of stopping it.
    #[arg(long)]
    end_out_of_band: bool,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::load(&cli.config)?;
    let catalog = config.catalog()?;
    let page = ProductPage::open(&catalog, &cli.product)?;
    let card = page.card();
    tracing::info!("{}: {} ({})", card.name, card.description, card.price);

    let platform = if cli.no_ar {
        SimPlatform::builder().ar_unsupported().build()
    } else {
        SimPlatform::builder().build()
    };
    let hub = platform.hub();
    let renderer = SimRenderer::new();
    let view_renderer = renderer.clone();

    let viewer = ArViewer::new(platform, SimResolver::ok(), config.viewer.clone());
    let status = viewer.status_handle();
    let mut view = match page.view_in_ar(viewer, move || view_renderer).await {
        Ok(view) => view,
        Err(e) => {
            tracing::warn!("{} ({})", status.status().message.unwrap_or_default(), ERROR_HINT);
            return Err(e.into());
        }
    };
    tracing::info!("Status: {}", view.status().message.unwrap_or_default());

    for _ in 0..cli.search_frames {
        hub.advance(None).await;
    }
    let surface = RigidTransform::from_translation(Vec3::new(0.0, -1.2, -1.5));
    hub.advance(Some(surface)).await;
    tracing::info!("Surface found; indicator visible: {}", renderer.last().is_some_and(|r| r.indicator_visible));

    hub.set_viewer_position(Vec3::new(0.05, 0.0, 0.1));
    hub.fire_select();
    let tapped = RigidTransform::from_translation(Vec3::new(0.05, -1.2, -1.4));
    hub.advance(Some(tapped)).await;
    tracing::info!("Placed: {}", view.is_placed());

    for _ in 0..cli.placed_frames {
        hub.advance(Some(surface)).await;
    }

    if cli.end_out_of_band {
        hub.end_out_of_band();
    }
    view.stop().await;

    let stats = view.frame_stats();
    tracing::info!(
        "Final status: {} | ticks {} | hit queries {} | hits {} | over budget {} | worst {}us",
        view.status().message.unwrap_or_default(),
        stats.ticks,
        stats.hit_queries,
        stats.hits,
        stats.over_budget,
        stats.worst_tick_us
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::warn!("arview_demo failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
