//! Wakeup dispatch background task

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::dispatcher::handle_wakeup;
use crate::state::AppState;

/// Background task that turns due wakeups into timer firings, one at a time
pub async fn wakeup_dispatch_task(state: Arc<AppState>, mut fired_rx: mpsc::UnboundedReceiver<i64>) {
    info!("Starting wakeup dispatch task");

    while let Some(id) = fired_rx.recv().await {
        match handle_wakeup(&state, id).await {
            Ok(outcome) => debug!("Wakeup for timer {} resolved as {:?}", id, outcome),
            Err(e) => error!("Wakeup for timer {} aborted: {}", id, e),
        }
    }

    info!("Wakeup channel closed, dispatch task exiting");
}
