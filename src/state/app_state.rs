//! Main application state management

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::{EditEffects, SessionCommand, SessionRegistry, Timer, TimerEdit};
use crate::{
    error::{Result, TimerError},
    services::{apply_arm_request, Clock, NotificationService, TimerStore, WakeupService},
};

/// Tunables for firing and edit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Minimum repeat granularity requested when arming a wakeup
    pub repeat_guard: Duration,
    /// How long a background firing waits for a foreground session to claim it
    pub claim_wait: Duration,
    /// Delay between the last edit in a session and its save
    pub save_debounce: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            repeat_guard: Duration::from_secs(5 * 60),
            claim_wait: Duration::from_millis(500),
            save_debounce: Duration::from_secs(1),
        }
    }
}

/// Shared state: collaborators, open edit sessions and server metadata
pub struct AppState {
    pub store: Arc<dyn TimerStore>,
    pub wakeups: Arc<dyn WakeupService>,
    pub notifier: Arc<dyn NotificationService>,
    pub clock: Arc<dyn Clock>,
    pub sessions: SessionRegistry,
    pub settings: DispatchSettings,
    /// Serializes load-modify-save of one timer outside an edit session
    record_locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last event tracking
    pub last_event: Arc<Mutex<Option<String>>>,
    pub last_event_time: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TimerStore>,
        wakeups: Arc<dyn WakeupService>,
        notifier: Arc<dyn NotificationService>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            wakeups,
            notifier,
            clock,
            sessions: SessionRegistry::new(),
            settings,
            record_locks: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
            port: 0,
            host: String::new(),
            last_event: Arc::new(Mutex::new(None)),
            last_event_time: Arc::new(Mutex::new(None)),
        }
    }

    /// Record the address the API is served on
    pub fn with_address(mut self, host: String, port: u16) -> Self {
        self.host = host;
        self.port = port;
        self
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn repeat_guard_ms(&self) -> i64 {
        self.settings.repeat_guard.as_millis() as i64
    }

    /// Remember the most recent inbound event for `/status`
    pub fn record_event(&self, event: &str) {
        if let Ok(mut last_event) = self.last_event.lock() {
            *last_event = Some(event.to_string());
        }
        if let Ok(mut last_time) = self.last_event_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    pub fn get_last_event(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_event = self.last_event.lock().ok().and_then(|a| a.clone());
        let last_event_time = self.last_event_time.lock().ok().and_then(|t| *t);
        (last_event, last_event_time)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Exclusive access to timer `id` for a load-modify-save sequence.
    ///
    /// Hold the guard until the record is saved. Edit sessions never take it,
    /// so it may be held while talking to one.
    pub async fn lock_timer(&self, id: i64) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .record_locks
                .lock()
                .map_err(|e| TimerError::Lock(format!("timer record locks: {}", e)))?;
            Arc::clone(locks.entry(id).or_default())
        };
        Ok(lock.lock_owned().await)
    }

    fn forget_lock(&self, id: i64) {
        if let Ok(mut locks) = self.record_locks.lock() {
            locks.remove(&id);
        }
    }

    /// Register or cancel the wakeup matching `timer`'s current state
    pub fn rearm(&self, timer: &Timer) -> Result<()> {
        apply_arm_request(
            self.wakeups.as_ref(),
            timer.compute_next_alarm(self.repeat_guard_ms()),
        )
    }

    /// Carry out the collaborator work an edit left behind
    pub fn apply_effects(&self, timer: &Timer, effects: EditEffects) -> Result<()> {
        if effects.cancel_notification {
            self.notifier.cancel(timer.id);
        }
        if effects.rearm {
            self.rearm(timer)?;
        }
        Ok(())
    }

    pub fn list_timers(&self) -> Result<Vec<Timer>> {
        Ok(self.store.get_all()?)
    }

    /// Current view of a timer, preferring an open session's working copy
    pub async fn get_timer(&self, id: i64) -> Result<Timer> {
        if self.sessions.is_open(id) {
            if let Ok(timer) = self
                .sessions
                .request(id, |reply| SessionCommand::Snapshot { reply })
                .await
            {
                return Ok(timer);
            }
        }
        self.store.get(id)?.ok_or(TimerError::NotFound(id))
    }

    /// Add a timer with default settings
    pub fn create_timer(&self, name: Option<String>) -> Result<Timer> {
        let mut timer = Timer::named(name.unwrap_or_default());
        self.store.save(&mut timer)?;
        info!("Created timer {} \"{}\"", timer.id, timer.name);
        Ok(timer)
    }

    /// Apply an edit, through the open session if there is one
    pub async fn edit_timer(&self, id: i64, edit: TimerEdit) -> Result<Timer> {
        if self.sessions.is_open(id) {
            return self
                .sessions
                .request(id, |reply| SessionCommand::Edit { edit, reply })
                .await;
        }

        let _guard = self.lock_timer(id).await?;
        let mut timer = self.store.get(id)?.ok_or(TimerError::NotFound(id))?;
        let effects = timer.apply_edit(&edit, &self.now());
        self.store.save(&mut timer)?;
        self.apply_effects(&timer, effects)?;
        debug!("Edited timer {}: {:?}", id, edit);
        Ok(timer)
    }

    /// Mark the pending firing as acknowledged
    pub async fn mark_seen(&self, id: i64) -> Result<Timer> {
        if self.sessions.is_open(id) {
            return self
                .sessions
                .request(id, |reply| SessionCommand::Acknowledge { reply })
                .await;
        }

        let _guard = self.lock_timer(id).await?;
        let mut timer = self.store.get(id)?.ok_or(TimerError::NotFound(id))?;
        if !timer.seen {
            timer.seen = true;
            self.store.save(&mut timer)?;
            info!("Timer {} acknowledged", id);
        }
        Ok(timer)
    }

    /// Disarm, clear and delete a timer, discarding any open session
    pub async fn remove_timer(&self, id: i64) -> Result<Timer> {
        if self.sessions.is_open(id) {
            if let Err(e) = self
                .sessions
                .request(id, |reply| SessionCommand::Close { flush: false, reply })
                .await
            {
                warn!("Failed to close edit session for timer {}: {}", id, e);
            }
        }

        let guard = self.lock_timer(id).await?;
        let mut timer = self.store.get(id)?.ok_or(TimerError::NotFound(id))?;
        timer.enabled = false;
        self.rearm(&timer)?;
        self.notifier.cancel(id);
        self.store.remove(id)?;
        drop(guard);
        self.forget_lock(id);
        info!("Removed timer {}", id);
        Ok(timer)
    }
}
