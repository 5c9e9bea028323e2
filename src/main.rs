//! keyshow-daemon: background engine for the keyshow keystroke overlay
//!
//! The daemon watches global keyboard input and, while one of the
//! configured target applications owns the foreground window, reduces
//! key presses into a combination string ("CTRL+SHIFT+A") published to
//! the overlay renderer. Released keys arm a debounced hide timer that
//! clears the text after the configured idle delay.
//!
//! Rendering, the settings form and the tray icon live in a companion
//! process; this daemon serves them over IPC with configuration
//! read/apply requests and a display-event subscription stream.

mod capture;
mod config;
mod display;
mod engine;
mod events;
mod focus;
mod ipc;
mod lifecycle;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{KeyEvent, KeyListener, ListenerControl};
use crate::config::Config;
use crate::display::BroadcastSink;
use crate::engine::{DisplayEngine, EngineMsg};
use crate::events::DisplayEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keyshow-daemon starting"
    );

    // Load configuration, bootstrapping a default file on first run
    let config_path = config::config_path();
    let config = Config::load_or_init(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path:?}"))?;
    info!(targets = config.executables.len(), "configuration loaded");
    if config.executables.is_empty() {
        warn!(
            "no target executables configured; the overlay stays hidden \
             until some are added through the settings surface"
        );
    }

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Everything touching engine state flows through one channel
    let (engine_tx, engine_rx) = mpsc::channel::<EngineMsg>(64);
    // Raw key events from the hook thread
    let (key_tx, mut key_rx) = mpsc::channel::<KeyEvent>(32);
    // Display events fanned out to IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<DisplayEvent>(64);

    // Start the global key listener (runs on dedicated threads)
    let mut listener = KeyListener::new(key_tx);
    match listener.start() {
        Ok(()) => {
            info!("key listener started");
        }
        Err(e) => {
            error!(?e, "failed to start key listener");
            warn!("continuing without keyboard capture - check platform support and permissions");
        }
    }

    // Bridge raw key events into the engine channel
    let key_engine_tx = engine_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = key_rx.recv().await {
            if key_engine_tx.send(EngineMsg::Key(event)).await.is_err() {
                break;
            }
        }
    });

    // Create the display engine owning all shared state
    #[cfg(windows)]
    let resolver = focus::WindowsResolver::new();
    #[cfg(not(windows))]
    let resolver = {
        warn!("no foreground-window query on this platform; the overlay never activates");
        focus::NullResolver
    };

    let sink = BroadcastSink::new(event_tx.clone());
    let mut engine = DisplayEngine::new(
        config.clone(),
        resolver,
        sink,
        Box::new(listener),
        engine_tx.clone(),
    );

    // Create the IPC server for the settings/tray companion
    let server = Server::bind(
        &config::ipc_addr(),
        config,
        config_path,
        event_tx.clone(),
        engine_tx.clone(),
    )
    .await?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    let mut fatal: Option<anyhow::Error> = None;
    tokio::select! {
        // Run the engine (processes key events, timers and reloads)
        result = engine.run(engine_rx) => {
            match result {
                Ok(()) => info!("display engine exited"),
                Err(e) => {
                    error!(?e, "display engine failed");
                    fatal = Some(e.into());
                }
            }
        }

        // Run the IPC server (accepts companion connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
                fatal = Some(e);
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;
    drop(engine); // stops the key listener

    if let Some(e) = fatal {
        return Err(e);
    }

    info!("keyshow-daemon stopped");

    Ok(())
}
