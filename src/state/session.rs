//! Registry of foreground edit sessions and the wakeup claim handshake

use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tracing::{debug, warn};

use super::{Timer, TimerEdit};
use crate::error::{Result, TimerError};

/// Requests handled by a running edit session
#[derive(Debug)]
pub enum SessionCommand {
    /// Apply an edit to the working copy; the save is debounced
    Edit {
        edit: TimerEdit,
        reply: oneshot::Sender<Timer>,
    },
    Snapshot {
        reply: oneshot::Sender<Timer>,
    },
    /// User acknowledged the pending firing
    Acknowledge {
        reply: oneshot::Sender<Timer>,
    },
    /// A wakeup fired for this timer; answer `true` to take it over
    Claim {
        reply: oneshot::Sender<bool>,
    },
    /// End the session, saving pending changes when `flush` is set
    Close {
        flush: bool,
        reply: oneshot::Sender<Timer>,
    },
}

/// Open sessions keyed by timer id; at most one per id
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<i64, mpsc::Sender<SessionCommand>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; returns false if a live one already owns `id`
    pub fn register(&self, id: i64, commands: mpsc::Sender<SessionCommand>) -> Result<bool> {
        let mut sessions = self.lock()?;
        if sessions.get(&id).is_some_and(|tx| !tx.is_closed()) {
            return Ok(false);
        }
        sessions.insert(id, commands);
        debug!("Registered edit session for timer {}", id);
        Ok(true)
    }

    pub fn unregister(&self, id: i64) {
        match self.sessions.lock() {
            Ok(mut sessions) => {
                sessions.remove(&id);
            }
            Err(e) => warn!("Failed to lock session registry: {}", e),
        }
    }

    /// Command channel of the live session for `id`
    pub fn handle(&self, id: i64) -> Option<mpsc::Sender<SessionCommand>> {
        let sessions = self.sessions.lock().ok()?;
        sessions.get(&id).filter(|tx| !tx.is_closed()).cloned()
    }

    pub fn is_open(&self, id: i64) -> bool {
        self.handle(id).is_some()
    }

    pub fn open_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .sessions
            .lock()
            .map(|s| s.iter().filter(|(_, tx)| !tx.is_closed()).map(|(id, _)| *id).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Offer a firing to the foreground session for `id`.
    ///
    /// Returns true only if a session answered yes within `wait`.
    pub async fn claim(&self, id: i64, wait: Duration) -> bool {
        let Some(tx) = self.handle(id) else {
            return false;
        };
        let (reply, answer) = oneshot::channel();
        let handshake = async move {
            tx.send(SessionCommand::Claim { reply }).await.ok()?;
            answer.await.ok()
        };
        match timeout(wait, handshake).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!("Edit session for timer {} went away during claim", id);
                false
            }
            Err(_) => {
                warn!("Edit session for timer {} did not answer within {:?}", id, wait);
                false
            }
        }
    }

    /// Send a command built around a reply channel and await the answer
    pub async fn request<T>(
        &self,
        id: i64,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let tx = self.handle(id).ok_or(TimerError::SessionClosed(id))?;
        let (reply, answer) = oneshot::channel();
        tx.send(make(reply))
            .await
            .map_err(|_| TimerError::SessionClosed(id))?;
        answer.await.map_err(|_| TimerError::SessionClosed(id))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<i64, mpsc::Sender<SessionCommand>>>> {
        self.sessions
            .lock()
            .map_err(|e| TimerError::Lock(format!("session registry: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_without_session_is_not_claimed() {
        let registry = SessionRegistry::new();
        assert!(!registry.claim(1, Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn claim_is_answered_by_the_session() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        assert!(registry.register(3, tx).unwrap());
        tokio::spawn(async move {
            if let Some(SessionCommand::Claim { reply }) = rx.recv().await {
                let _ = reply.send(true);
            }
        });
        assert!(registry.claim(3, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn silent_session_times_out_unclaimed() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.register(3, tx).unwrap();
        assert!(!registry.claim(3, Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn closed_sessions_can_be_replaced() {
        let registry = SessionRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.register(5, tx).unwrap();
        let (tx2, _rx2) = mpsc::channel(1);
        assert!(!registry.register(5, tx2.clone()).unwrap());
        drop(rx);
        assert!(!registry.is_open(5));
        assert!(registry.register(5, tx2).unwrap());
        assert_eq!(registry.open_ids(), vec![5]);
    }

    #[tokio::test]
    async fn request_to_missing_session_fails() {
        let registry = SessionRegistry::new();
        let result = registry
            .request(8, |reply| SessionCommand::Snapshot { reply })
            .await;
        assert!(matches!(result, Err(TimerError::SessionClosed(8))));
    }
}
