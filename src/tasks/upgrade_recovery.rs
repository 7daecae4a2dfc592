//! Upgrade recovery background task

use std::sync::Arc;
use futures::stream::StreamExt;
use tracing::{info, warn};

use super::dispatcher::rearm_all;
use crate::{state::AppState, utils::reload_signals};

/// Background task that re-arms every enabled timer whenever SIGHUP arrives,
/// the daemon's equivalent of an application upgrade
pub async fn upgrade_recovery_task(state: Arc<AppState>) {
    let mut signals = match reload_signals() {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Failed to install SIGHUP handler, upgrade recovery disabled: {}", e);
            return;
        }
    };
    info!("Starting upgrade recovery task");

    while let Some(signal) = signals.next().await {
        info!("Received signal {}, re-arming timers", signal);
        if let Err(e) = rearm_all(&state) {
            warn!("Re-arm pass failed: {}", e);
        }
    }
}
