//! X-Touch OBS Mixer
//!
//! Binds the strips of a Behringer X-Touch Extender to OBS Studio audio inputs.

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xtouch_obs_mixer::config::AppConfig;
use xtouch_obs_mixer::obs::{hydrate_catalog, ConnectionStatus, InputCatalog, ObsClient};
use xtouch_obs_mixer::paths::AppPaths;
use xtouch_obs_mixer::router::{subscribe_events, Router, RouterActor, RouterHandle};
use xtouch_obs_mixer::state::{LayoutSnapshot, PersistenceActor, PersistenceActorHandle};
use xtouch_obs_mixer::xtouch::{discovery, Surface, XTouchDriver};

/// X-Touch OBS Mixer - drive the OBS audio mixer from a Behringer X-Touch Extender
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Start with every strip unbound, ignoring the saved layout
    #[arg(long)]
    reset_layout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();
    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());

    // The file sink depends on the config, so a load failure is reported once logging is up
    let (mut config, config_error) = match AppConfig::load(&config_path).await {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    let _log_guard = init_logging(&args.log_level, config.logging.file.then_some(&paths))?;

    info!("Starting X-Touch OBS Mixer v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());
    if let Some(e) = config_error {
        warn!("Using default configuration: {:#}", e);
    }
    config.apply_env();

    if args.list_ports {
        discovery::print_ports(&config.surface.device_signature, config.surface.device_index);
        return Ok(());
    }

    run_app(config, paths, args.reset_layout).await?;

    info!("X-Touch OBS Mixer shutdown complete");
    Ok(())
}

async fn run_app(config: AppConfig, paths: AppPaths, reset_layout: bool) -> Result<()> {
    paths.ensure_directories()?;

    // Hardware first: without the surface there is nothing to do
    let mut xtouch = XTouchDriver::new(&config.surface);
    xtouch.connect().context("Failed to open the X-Touch MIDI ports")?;
    let sink = xtouch
        .sink()
        .ok_or_else(|| anyhow::anyhow!("X-Touch output not available"))?;
    let mut xtouch_rx = xtouch
        .take_event_receiver()
        .ok_or_else(|| anyhow::anyhow!("Failed to get X-Touch event receiver"))?;

    let db_path = config.state.path.clone().unwrap_or_else(|| paths.layout_db());
    let persistence = PersistenceActor::spawn(&db_path, config.state.debounce_ms)?;
    info!("Layout database: {}", db_path.display());

    let saved_layout = if reset_layout {
        info!("Ignoring saved layout (--reset-layout)");
        LayoutSnapshot::empty()
    } else {
        match persistence.load_snapshot().await {
            Ok(Some(layout)) => layout,
            Ok(None) => LayoutSnapshot::empty(),
            Err(e) => {
                warn!("Failed to load saved layout: {:#}", e);
                LayoutSnapshot::empty()
            }
        }
    };

    // Strips stay idle until the replica is hydrated
    let router = Router::new(
        config.surface.strip_count,
        Surface::new(sink),
        InputCatalog::new(),
    )
    .with_persistence(persistence.clone());

    let obs = ObsClient::new(&config.obs);
    let handle = RouterActor::spawn(router, obs.clone());
    subscribe_events(obs.as_ref(), &handle);

    let pending_layout = Arc::new(Mutex::new(Some(saved_layout)));
    {
        let obs_for_status = Arc::downgrade(&obs);
        let handle = handle.clone();
        obs.on_status(Arc::new(move |status: ConnectionStatus| match status {
            ConnectionStatus::Connected => {
                if let Some(obs) = obs_for_status.upgrade() {
                    spawn_resync(obs, handle.clone(), Arc::clone(&pending_layout));
                }
            }
            ConnectionStatus::Disconnected => warn!("OBS offline, strips keep their last state"),
            ConnectionStatus::Reconnecting { attempt } => {
                debug!("Waiting for OBS (attempt {})", attempt)
            }
        }));
    }
    obs.start().await;

    info!("Ready to process X-Touch events!");

    let forward_handle = handle.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = xtouch_rx.recv().await {
            forward_handle.midi_in(event.raw_data, event.timestamp);
        }
        debug!("X-Touch input stream ended");
    });

    shutdown_signal().await;

    info!("Shutting down...");
    xtouch.close_input();
    forwarder.abort();

    let final_layout = handle.shutdown().await;
    obs.disconnect().await;
    save_final_layout(&persistence, final_layout).await;
    xtouch.disconnect().await;

    Ok(())
}

/// Re-hydrate the replica after a (re)connect and resynchronise the strips
///
/// The saved layout is applied once, after the first successful hydration.
fn spawn_resync(
    obs: Arc<ObsClient>,
    handle: RouterHandle,
    pending_layout: Arc<Mutex<Option<LayoutSnapshot>>>,
) {
    tokio::spawn(async move {
        match hydrate_catalog(obs.as_ref()).await {
            Ok(catalog) => {
                handle.replace_catalog(catalog);
                if let Some(layout) = pending_layout.lock().take() {
                    handle.apply_layout(layout);
                }
            }
            Err(e) => warn!("Failed to read the OBS input list: {}", e),
        }
    });
}

async fn save_final_layout(persistence: &PersistenceActorHandle, layout: Option<LayoutSnapshot>) {
    if let Some(layout) = layout {
        if let Err(e) = persistence.save_snapshot(layout).await {
            warn!("Failed to queue final layout: {:#}", e);
        }
    }
    if let Err(e) = persistence.flush().await {
        warn!("Failed to flush layout: {:#}", e);
    }
    persistence.shutdown().await;
}

fn init_logging(
    level: &str,
    file_paths: Option<&AppPaths>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let Some(paths) = file_paths else {
        tracing_subscriber::registry().with(filter).with(console).init();
        return Ok(None);
    };

    std::fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("Failed to create log directory {}", paths.logs_dir.display()))?;
    let appender = tracing_appender::rolling::daily(&paths.logs_dir, "xtouch-obs-mixer.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer),
        )
        .init();

    Ok(Some(guard))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C ({}), shutting down", e);
        return;
    }
    info!("Shutdown signal received");
}
