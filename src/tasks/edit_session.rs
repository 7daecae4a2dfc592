//! Foreground edit session task

use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

use super::dispatcher::{fire, persist_and_rearm};
use crate::{
    error::{Result, TimerError},
    state::{AppState, SessionCommand, Timer},
};

const COMMAND_BUFFER: usize = 16;

/// Open a session for timer `id`, or return the live session's working copy
pub async fn open_session(state: &Arc<AppState>, id: i64) -> Result<Timer> {
    if state.sessions.is_open(id) {
        return state
            .sessions
            .request(id, |reply| SessionCommand::Snapshot { reply })
            .await;
    }

    // A firing in progress finishes its save before the working copy is loaded
    let _guard = state.lock_timer(id).await?;
    let timer = state.store.get(id)?.ok_or(TimerError::NotFound(id))?;
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    if !state.sessions.register(id, tx)? {
        // Lost a race with another opener
        return state
            .sessions
            .request(id, |reply| SessionCommand::Snapshot { reply })
            .await;
    }

    tokio::spawn(edit_session_task(Arc::clone(state), timer.clone(), rx));
    Ok(timer)
}

/// Close the session for timer `id`, saving pending changes
pub async fn close_session(state: &AppState, id: i64) -> Result<Timer> {
    state
        .sessions
        .request(id, |reply| SessionCommand::Close { flush: true, reply })
        .await
}

fn save(state: &AppState, timer: &mut Timer) -> bool {
    match state.store.save(timer) {
        Ok(_) => {
            debug!("Edit session saved timer {}", timer.id);
            true
        }
        Err(e) => {
            error!("Edit session failed to save timer {}: {}", timer.id, e);
            false
        }
    }
}

/// Owns the working copy of one timer until closed.
///
/// Edits are saved once no further edit arrives for the debounce delay.
/// Wakeups for this timer are claimed and handled here so that the working
/// copy is never overwritten by a stale background save.
pub async fn edit_session_task(
    state: Arc<AppState>,
    mut timer: Timer,
    mut commands: mpsc::Receiver<SessionCommand>,
) {
    let id = timer.id;
    info!("Edit session opened for timer {}", id);
    let mut save_at: Option<Instant> = None;

    loop {
        let deadline = save_at;
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Edit { edit, reply }) => {
                        let effects = timer.apply_edit(&edit, &state.now());
                        if let Err(e) = state.apply_effects(&timer, effects) {
                            warn!("Failed to apply edit effects for timer {}: {}", id, e);
                        }
                        save_at = Some(Instant::now() + state.settings.save_debounce);
                        let _ = reply.send(timer.clone());
                    }
                    Some(SessionCommand::Snapshot { reply }) => {
                        let _ = reply.send(timer.clone());
                    }
                    Some(SessionCommand::Acknowledge { reply }) => {
                        if !timer.seen {
                            timer.seen = true;
                            if save(&state, &mut timer) {
                                save_at = None;
                            }
                        }
                        let _ = reply.send(timer.clone());
                    }
                    Some(SessionCommand::Claim { reply }) => {
                        let firing = fire(&state, &mut timer, &state.now());
                        let dirty = firing.changed || save_at.is_some();
                        match persist_and_rearm(&state, &mut timer, dirty, firing.rearm) {
                            Ok(_) => save_at = None,
                            Err(e) => {
                                error!("Edit session failed to commit firing of timer {}: {}", id, e);
                                save_at = Some(Instant::now() + state.settings.save_debounce);
                            }
                        }
                        let _ = reply.send(true);
                    }
                    Some(SessionCommand::Close { flush, reply }) => {
                        if flush && save_at.is_some() {
                            save(&state, &mut timer);
                        }
                        state.sessions.unregister(id);
                        let _ = reply.send(timer.clone());
                        break;
                    }
                    None => {
                        if save_at.is_some() {
                            save(&state, &mut timer);
                        }
                        state.sessions.unregister(id);
                        break;
                    }
                }
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if save(&state, &mut timer) {
                    save_at = None;
                } else {
                    save_at = Some(Instant::now() + state.settings.save_debounce);
                }
            }
        }
    }

    info!("Edit session closed for timer {}", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{FixedOffset, TimeZone};

    use crate::{
        services::{FixedClock, NotificationBoard, NotificationService, SqliteStore, TokioWakeups},
        state::{DispatchSettings, TimerEdit},
        tasks::dispatcher::{handle_wakeup, WakeupOutcome},
    };

    fn state() -> Arc<AppState> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let now = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        Arc::new(AppState::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(TokioWakeups::new(tx)),
            Arc::new(NotificationBoard::new()),
            Arc::new(FixedClock(now)),
            DispatchSettings {
                claim_wait: Duration::from_millis(500),
                save_debounce: Duration::from_millis(50),
                ..DispatchSettings::default()
            },
        ))
    }

    #[tokio::test]
    async fn edits_are_saved_after_the_debounce() {
        let state = state();
        let timer = state.create_timer(None).unwrap();
        open_session(&state, timer.id).await.unwrap();

        let edit = TimerEdit {
            name: Some("Tea".into()),
            ..TimerEdit::default()
        };
        let working = state.edit_timer(timer.id, edit).await.unwrap();
        assert_eq!(working.name, "Tea");
        assert_eq!(state.store.get(timer.id).unwrap().unwrap().name, "");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(state.store.get(timer.id).unwrap().unwrap().name, "Tea");
        close_session(&state, timer.id).await.unwrap();
        assert!(!state.sessions.is_open(timer.id));
    }

    #[tokio::test]
    async fn close_flushes_pending_edits() {
        let state = state();
        let timer = state.create_timer(None).unwrap();
        open_session(&state, timer.id).await.unwrap();
        let edit = TimerEdit {
            day_led: Some(false),
            ..TimerEdit::default()
        };
        state.edit_timer(timer.id, edit).await.unwrap();
        let closed = close_session(&state, timer.id).await.unwrap();
        assert!(!closed.day_led);
        assert!(!state.store.get(timer.id).unwrap().unwrap().day_led);
    }

    #[tokio::test]
    async fn open_session_claims_the_firing_and_its_save_wins() {
        let state = state();
        let mut timer = state.create_timer(None).unwrap();
        timer.enabled = true;
        timer.day_wait = false;
        timer.next_fire_at = state.now().timestamp_millis();
        state.store.save(&mut timer).unwrap();

        open_session(&state, timer.id).await.unwrap();
        let edit = TimerEdit {
            name: Some("Foreground".into()),
            ..TimerEdit::default()
        };
        state.edit_timer(timer.id, edit).await.unwrap();

        let outcome = handle_wakeup(&state, timer.id).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Claimed);

        let stored = state.store.get(timer.id).unwrap().unwrap();
        assert_eq!(stored.name, "Foreground");
        assert_eq!(stored.next_fire_at, state.now().timestamp_millis() + 4 * 3_600_000 + 3);
        assert_eq!(state.notifier.pending().len(), 1);
        close_session(&state, timer.id).await.unwrap();
    }

    #[tokio::test]
    async fn opening_twice_returns_the_working_copy() {
        let state = state();
        let timer = state.create_timer(None).unwrap();
        open_session(&state, timer.id).await.unwrap();
        state
            .edit_timer(timer.id, TimerEdit { name: Some("x".into()), ..TimerEdit::default() })
            .await
            .unwrap();
        let again = open_session(&state, timer.id).await.unwrap();
        assert_eq!(again.name, "x");
        close_session(&state, timer.id).await.unwrap();
    }

    #[tokio::test]
    async fn opening_a_missing_timer_fails() {
        let state = state();
        assert!(matches!(
            open_session(&state, 77).await,
            Err(TimerError::NotFound(77))
        ));
    }
}
