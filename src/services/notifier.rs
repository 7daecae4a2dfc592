//! Notification display

use std::{collections::BTreeMap, sync::Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::NotificationPlan;

/// Displays and withdraws notifications keyed by timer id; both calls are idempotent
pub trait NotificationService: Send + Sync {
    fn post(&self, id: i64, plan: &NotificationPlan);
    fn cancel(&self, id: i64);
    /// Notifications currently on display
    fn pending(&self) -> Vec<PendingNotification>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub timer_id: i64,
    pub posted_at: DateTime<Utc>,
    pub plan: NotificationPlan,
}

/// In-memory notification shade; each post replaces the entry for that timer
#[derive(Debug, Default)]
pub struct NotificationBoard {
    entries: Mutex<BTreeMap<i64, PendingNotification>>,
}

impl NotificationBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationService for NotificationBoard {
    fn post(&self, id: i64, plan: &NotificationPlan) {
        let sound = plan.sound.as_ref().map(|t| t.as_str()).unwrap_or("silent");
        info!(
            "Notify timer {} \"{}\" ({}, sound={}, led={})",
            id,
            plan.title,
            if plan.night { "night" } else { "day" },
            sound,
            plan.use_led
        );
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(
                    id,
                    PendingNotification {
                        timer_id: id,
                        posted_at: Utc::now(),
                        plan: plan.clone(),
                    },
                );
            }
            Err(e) => warn!("Failed to lock notification board: {}", e),
        }
    }

    fn cancel(&self, id: i64) {
        match self.entries.lock() {
            Ok(mut entries) => {
                if entries.remove(&id).is_some() {
                    info!("Cleared notification for timer {}", id);
                }
            }
            Err(e) => warn!("Failed to lock notification board: {}", e),
        }
    }

    fn pending(&self) -> Vec<PendingNotification> {
        self.entries
            .lock()
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }
}
