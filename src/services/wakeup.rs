//! Wakeup registration

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use chrono::Utc;
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{error::Result, error::TimerError, state::ArmRequest};

/// Registers or cancels future wakeups keyed by timer id; both calls are idempotent
pub trait WakeupService: Send + Sync {
    /// Fire at `at_ms` and then every `repeat_ms` until disarmed
    fn arm(&self, id: i64, at_ms: i64, repeat_ms: i64) -> Result<()>;
    fn disarm(&self, id: i64) -> Result<()>;
}

/// Forward an arm/disarm decision to a wakeup service
pub fn apply_arm_request(wakeups: &dyn WakeupService, request: ArmRequest) -> Result<()> {
    match request {
        ArmRequest::Arm { id, at_ms, repeat_ms } => wakeups.arm(id, at_ms, repeat_ms),
        ArmRequest::Disarm { id } => wakeups.disarm(id),
    }
}

/// In-process wakeups: one tokio task per armed timer that sends the id on
/// a channel when due and keeps repeating until replaced or cancelled
pub struct TokioWakeups {
    runtime: Handle,
    fired_tx: mpsc::UnboundedSender<i64>,
    tasks: Mutex<HashMap<i64, JoinHandle<()>>>,
}

impl TokioWakeups {
    /// Must be called from within a tokio runtime
    pub fn new(fired_tx: mpsc::UnboundedSender<i64>) -> Self {
        Self {
            runtime: Handle::current(),
            fired_tx,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Ids with a live registration
    pub fn armed_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = match self.tasks.lock() {
            Ok(tasks) => tasks
                .iter()
                .filter(|(_, handle)| !handle.is_finished())
                .map(|(id, _)| *id)
                .collect(),
            Err(e) => {
                warn!("Failed to lock wakeup table: {}", e);
                Vec::new()
            }
        };
        ids.sort_unstable();
        ids
    }
}

impl WakeupService for TokioWakeups {
    fn arm(&self, id: i64, at_ms: i64, repeat_ms: i64) -> Result<()> {
        let delay = Duration::from_millis(at_ms.saturating_sub(Utc::now().timestamp_millis()).max(0) as u64);
        let repeat = Duration::from_millis(repeat_ms.max(1) as u64);
        let tx = self.fired_tx.clone();

        let handle = self.runtime.spawn(async move {
            sleep(delay).await;
            loop {
                debug!("Wakeup due for timer {}", id);
                if tx.send(id).is_err() {
                    debug!("Wakeup channel closed, dropping wakeup for timer {}", id);
                    return;
                }
                sleep(repeat).await;
            }
        });

        match self.tasks.lock() {
            Ok(mut tasks) => {
                if let Some(previous) = tasks.insert(id, handle) {
                    previous.abort();
                }
                info!("Armed timer {} in {}s (repeat every {}s)", id, delay.as_secs(), repeat.as_secs());
                Ok(())
            }
            Err(e) => {
                handle.abort();
                Err(TimerError::Wakeup(format!("Failed to lock wakeup table: {}", e)))
            }
        }
    }

    fn disarm(&self, id: i64) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| TimerError::Wakeup(format!("Failed to lock wakeup table: {}", e)))?;
        if let Some(handle) = tasks.remove(&id) {
            handle.abort();
            info!("Disarmed timer {}", id);
        }
        Ok(())
    }
}

impl Drop for TokioWakeups {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for handle in tasks.values() {
                handle.abort();
            }
        }
    }
}
