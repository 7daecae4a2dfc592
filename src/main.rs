//! Night Timer - A recurring-reminder daemon with day/night aware notifications
//!
//! This is the main entry point for the night-timer application.

use std::sync::Arc;
use anyhow::Context;
use tokio::{net::TcpListener, sync::mpsc};
use tracing::info;

use night_timer::{
    api::create_router,
    config::Config,
    services::{NotificationBoard, SqliteStore, SystemClock, TokioWakeups},
    state::AppState,
    tasks::{rearm_all, upgrade_recovery_task, wakeup_dispatch_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("night_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting night-timer v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, db={}",
          config.host, config.port, config.db.display());

    let store = SqliteStore::open(&config.db)
        .with_context(|| format!("Failed to open timer database {}", config.db.display()))?;

    // Wakeups fire into this channel and are dispatched one at a time
    let (fired_tx, fired_rx) = mpsc::unbounded_channel();

    let state = Arc::new(
        AppState::new(
            Arc::new(store),
            Arc::new(TokioWakeups::new(fired_tx)),
            Arc::new(NotificationBoard::new()),
            Arc::new(SystemClock),
            config.dispatch_settings(),
        )
        .with_address(config.host.clone(), config.port),
    );

    // Wakeups do not survive a restart, so recreate them from the stored schedule
    rearm_all(&state).context("Initial re-arm pass failed")?;

    let dispatch_state = Arc::clone(&state);
    tokio::spawn(async move {
        wakeup_dispatch_task(dispatch_state, fired_rx).await;
    });

    let upgrade_state = Arc::clone(&state);
    tokio::spawn(async move {
        upgrade_recovery_task(upgrade_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET/POST             /timers                 - List or add timers");
    info!("  GET/PATCH/DELETE     /timers/:id             - Read, edit or remove a timer");
    info!("  POST                 /timers/:id/seen        - Acknowledge a firing");
    info!("  POST/GET/PATCH/DELETE /timers/:id/session    - Foreground edit session");
    info!("  GET                  /timers/:id/condition   - Overdue condition query");
    info!("  POST                 /events/wakeup/:id      - Deliver a wakeup");
    info!("  POST                 /events/boot            - Re-arm all timers");
    info!("  GET                  /notifications          - Displayed notifications");
    info!("  GET                  /status, /health");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
