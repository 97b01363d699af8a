//! Square Savior game server
//!
//! Loads the song catalog, starts the game runtime and serves the
//! presentation API until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use square_savior::{
    artwork::ArtworkCache,
    catalog::{CatalogProvider, JsonCatalog},
    config::AppConfig,
    game::{RoundStateMachine, SessionResult},
    lookup::ItunesLookup,
    playback::{HeadlessDevice, PlaybackController},
    runtime::{GameHandle, GameRuntime},
    ui::WebServer,
};

#[derive(Parser, Debug)]
#[command(name = "savior", version, about = "Twenty-round song picking game")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SAVIOR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of catalog JSON files
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Fixed seed for round selection
    #[arg(long)]
    seed: Option<u64>,

    /// HTTP port for the presentation API
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address for the presentation API
    #[arg(long)]
    bind: Option<String>,

    /// Refuse playback until the first user gesture
    #[arg(long)]
    require_gesture: bool,

    /// Write each finished session's result to this JSON file
    #[arg(long)]
    result_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting Square Savior");

    let mut config =
        AppConfig::load_or_default(args.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = args.catalog {
        config.catalog.data_dir = dir;
    }
    if let Some(port) = args.port {
        config.ui.http_port = port;
    }
    if let Some(bind) = args.bind {
        config.ui.bind_address = bind;
    }
    if args.require_gesture {
        config.playback.require_gesture = true;
    }
    config.validate()?;

    let catalog = JsonCatalog::load(&config.catalog.data_dir)
        .with_context(|| format!("loading catalog from {}", config.catalog.data_dir.display()))?;
    tracing::info!(
        songs = catalog.len(),
        dir = %catalog.dir().display(),
        "Catalog loaded"
    );

    let lookup = Arc::new(ItunesLookup::new(&config.lookup)?);
    let controller = PlaybackController::new(
        HeadlessDevice::new(&config.playback),
        config.game.ceiling(),
        config.playback.volume,
    );
    let mut machine = RoundStateMachine::new(
        config.game.clone(),
        catalog.list_all(),
        controller,
        ArtworkCache::new(),
    );
    if let Some(seed) = args.seed {
        machine = machine.with_seed(seed);
    }

    let (runtime, handle) = GameRuntime::new(machine, lookup);
    let game_task = tokio::spawn(runtime.run());

    let web_server = WebServer::new(config.ui.clone(), handle.clone());
    let _web_handle = web_server.start_background();
    tracing::info!(
        "Web UI available at http://{}:{}",
        config.ui.bind_address,
        config.ui.http_port
    );

    tokio::spawn(report_results(handle.clone(), args.result_out));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    handle.shutdown();
    game_task.await??;

    Ok(())
}

/// Log every finished session, optionally writing it out as JSON
async fn report_results(handle: GameHandle, out: Option<PathBuf>) {
    let mut rx = handle.subscribe();
    let mut reported: Option<Uuid> = None;

    loop {
        let finished = rx.borrow_and_update().result.clone();
        if let Some(result) = finished {
            if reported != Some(result.session_id) {
                reported = Some(result.session_id);
                log_result(&result);
                if let Some(path) = &out {
                    if let Err(e) = write_result(path, &result) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to write result");
                    }
                }
            }
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn log_result(result: &SessionResult) {
    tracing::info!(session = %result.session_id, "Your picks:");
    for (round, pick) in result.picks.iter().enumerate() {
        tracing::info!("  {:>2}. {}", round + 1, pick);
    }
    tracing::info!("Playlist: {}", result.playlist_url());
}

fn write_result(path: &std::path::Path, result: &SessionResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "Result written");
    Ok(())
}
