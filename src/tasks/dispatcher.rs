//! Reactions to wakeups, boot/upgrade and automation queries

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, TimerError},
    services::apply_arm_request,
    state::{AppState, ArmRequest, NotificationOutcome, Timer},
};

/// How a wakeup was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeupOutcome {
    /// Timer was deleted after the wakeup was armed
    Missing,
    /// A foreground edit session took the firing over
    Claimed,
    Handled { saved: bool, waiting: bool },
}

/// Answer to "is timer X at least N minutes overdue?"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionState {
    Unknown,
    Satisfied,
    Unsatisfied,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RearmReport {
    pub rearmed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of running the firing decision on a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Firing {
    /// The record differs from what is stored
    pub changed: bool,
    pub waiting: bool,
    /// Wakeup to register once the record is safely stored
    pub rearm: Option<ArmRequest>,
}

/// Parse a timer id from a loosely typed event payload such as `"12"` or `"timer:12"`
pub fn parse_timer_id(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("timer:").unwrap_or(trimmed);
    digits
        .parse::<i64>()
        .map_err(|e| TimerError::MalformedEvent(format!("bad timer id {:?}: {}", raw, e)))
}

/// Decide and post the notification for a firing, then reset unless waiting.
///
/// The wait decision is taken before the notification consumes the one-shot
/// night override, so the override governs both.
pub fn fire(state: &AppState, timer: &mut Timer, now: &DateTime<FixedOffset>) -> Firing {
    let waiting = timer.should_wait(now);
    let consumes_override = timer.enabled && timer.night_next;

    match timer.compute_notification(now) {
        NotificationOutcome::Post(plan) => state.notifier.post(timer.id, &plan),
        NotificationOutcome::DisarmOnly => {
            debug!("Timer {} is disabled, clearing instead of notifying", timer.id);
            state.notifier.cancel(timer.id);
            return Firing {
                changed: false,
                waiting: false,
                rearm: Some(ArmRequest::Disarm { id: timer.id }),
            };
        }
    }

    if waiting {
        debug!("Timer {} waits for acknowledgement", timer.id);
        return Firing {
            changed: consumes_override,
            waiting,
            rearm: None,
        };
    }

    timer.reset(now);
    Firing {
        changed: true,
        waiting,
        rearm: Some(timer.compute_next_alarm(state.repeat_guard_ms())),
    }
}

/// Save when needed, and only then register the follow-up wakeup
pub fn persist_and_rearm(state: &AppState, timer: &mut Timer, save: bool, rearm: Option<ArmRequest>) -> Result<bool> {
    if save {
        state.store.save(timer)?;
    }
    if let Some(request) = rearm {
        apply_arm_request(state.wakeups.as_ref(), request)?;
    }
    Ok(save)
}

/// React to the wakeup for timer `id`
pub async fn handle_wakeup(state: &AppState, id: i64) -> Result<WakeupOutcome> {
    state.record_event(&format!("wakeup:{}", id));
    let _guard = state.lock_timer(id).await?;

    if state.sessions.claim(id, state.settings.claim_wait).await {
        info!("Edit session claimed the firing of timer {}", id);
        return Ok(WakeupOutcome::Claimed);
    }

    let Some(mut timer) = state.store.get(id)? else {
        info!("Timer {} no longer exists, ignoring wakeup", id);
        state.wakeups.disarm(id)?;
        return Ok(WakeupOutcome::Missing);
    };

    let now = state.now();
    let firing = fire(state, &mut timer, &now);
    let saved = persist_and_rearm(state, &mut timer, firing.changed, firing.rearm)?;
    info!(
        "Timer {} fired (saved={}, waiting={})",
        id, saved, firing.waiting
    );
    Ok(WakeupOutcome::Handled {
        saved,
        waiting: firing.waiting,
    })
}

/// Entry point for externally delivered wakeups; never fails
pub async fn handle_wakeup_payload(state: &AppState, raw: &str) -> Option<WakeupOutcome> {
    let id = match parse_timer_id(raw) {
        Ok(id) => id,
        Err(e) => {
            warn!("Discarding wakeup: {}", e);
            return None;
        }
    };
    match handle_wakeup(state, id).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!("Wakeup for timer {} aborted: {}", id, e);
            None
        }
    }
}

/// Re-register the wakeup of every enabled timer after a boot or upgrade
pub fn rearm_all(state: &AppState) -> Result<RearmReport> {
    state.record_event("boot");
    let timers = state.store.get_all()?;
    let mut report = RearmReport::default();

    for timer in timers {
        if !timer.enabled {
            report.skipped += 1;
            continue;
        }
        match state.rearm(&timer) {
            Ok(()) => report.rearmed += 1,
            Err(e) => {
                warn!("Failed to re-arm timer {}: {}", timer.id, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Re-armed {} timers ({} disabled, {} failed)",
        report.rearmed, report.skipped, report.failed
    );
    Ok(report)
}

/// Whether timer `id` is at least `minutes` past its scheduled firing; read only
pub fn query_condition(state: &AppState, id: i64, minutes: i64) -> Result<ConditionState> {
    let Some(timer) = state.store.get(id)? else {
        return Ok(ConditionState::Unknown);
    };
    Ok(if timer.is_late_by_mins(&state.now(), minutes) {
        ConditionState::Satisfied
    } else {
        ConditionState::Unsatisfied
    })
}

/// Entry point for automation queries with raw parameters; never fails
pub fn query_condition_payload(state: &AppState, raw_id: &str, raw_minutes: Option<&str>) -> ConditionState {
    let parsed = parse_timer_id(raw_id).and_then(|id| {
        let minutes = raw_minutes
            .ok_or_else(|| TimerError::MalformedEvent("missing minutes".into()))?
            .trim()
            .parse::<i64>()
            .map_err(|e| TimerError::MalformedEvent(format!("bad minutes: {}", e)))?;
        Ok((id, minutes))
    });

    let (id, minutes) = match parsed {
        Ok(p) => p,
        Err(e) => {
            warn!("Discarding condition query: {}", e);
            return ConditionState::Unknown;
        }
    };

    query_condition(state, id, minutes).unwrap_or_else(|e| {
        error!("Condition query for timer {} failed: {}", id, e);
        ConditionState::Unknown
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone};

    use crate::{
        error::StoreError,
        services::{FixedClock, NotificationBoard, NotificationService, SqliteStore, TimerStore, WakeupService},
        state::{DispatchSettings, TimerEdit},
    };

    #[derive(Default)]
    struct RecordingWakeups(Mutex<Vec<ArmRequest>>);

    impl RecordingWakeups {
        fn requests(&self) -> Vec<ArmRequest> {
            self.0.lock().unwrap().clone()
        }
    }

    impl WakeupService for RecordingWakeups {
        fn arm(&self, id: i64, at_ms: i64, repeat_ms: i64) -> Result<()> {
            if id == 13 {
                return Err(TimerError::Wakeup("unlucky".into()));
            }
            self.0.lock().unwrap().push(ArmRequest::Arm { id, at_ms, repeat_ms });
            Ok(())
        }
        fn disarm(&self, id: i64) -> Result<()> {
            self.0.lock().unwrap().push(ArmRequest::Disarm { id });
            Ok(())
        }
    }

    /// Counts writes and can be told to fail
    struct CountingStore {
        inner: SqliteStore,
        saves: Mutex<usize>,
        fail: bool,
    }

    impl TimerStore for CountingStore {
        fn get(&self, id: i64) -> Result<Option<Timer>, StoreError> {
            if self.fail {
                return Err(StoreError::Poisoned("offline".into()));
            }
            self.inner.get(id)
        }
        fn get_all(&self) -> Result<Vec<Timer>, StoreError> {
            self.inner.get_all()
        }
        fn save(&self, timer: &mut Timer) -> Result<i64, StoreError> {
            *self.saves.lock().unwrap() += 1;
            self.inner.save(timer)
        }
        fn remove(&self, id: i64) -> Result<bool, StoreError> {
            self.inner.remove(id)
        }
    }

    struct Fixture {
        state: AppState,
        store: Arc<CountingStore>,
        wakeups: Arc<RecordingWakeups>,
        board: Arc<NotificationBoard>,
        now: DateTime<FixedOffset>,
    }

    impl Fixture {
        fn at_hour(hour: u32) -> Self {
            Self::build(hour, false)
        }

        fn build(hour: u32, fail: bool) -> Self {
            let now = FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 1, 15, hour, 0, 0)
                .unwrap();
            let store = Arc::new(CountingStore {
                inner: SqliteStore::open_in_memory().unwrap(),
                saves: Mutex::new(0),
                fail,
            });
            let wakeups = Arc::new(RecordingWakeups::default());
            let board = Arc::new(NotificationBoard::new());
            let state = AppState::new(
                store.clone(),
                wakeups.clone(),
                board.clone(),
                Arc::new(FixedClock(now)),
                DispatchSettings {
                    claim_wait: std::time::Duration::from_millis(50),
                    ..DispatchSettings::default()
                },
            );
            Self { state, store, wakeups, board, now }
        }

        fn insert(&self, timer: Timer) -> Timer {
            let mut timer = timer;
            self.store.inner.save(&mut timer).unwrap();
            timer
        }

        fn saves(&self) -> usize {
            *self.store.saves.lock().unwrap()
        }
    }

    fn due(now: &DateTime<FixedOffset>) -> Timer {
        Timer {
            enabled: true,
            next_fire_at: now.timestamp_millis(),
            interval_secs: 3_600,
            day_wait: false,
            night_wait: true,
            ..Timer::default()
        }
    }

    #[tokio::test]
    async fn unknown_timer_is_a_quiet_no_op() {
        let fx = Fixture::at_hour(12);
        let outcome = handle_wakeup(&fx.state, 99).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Missing);
        assert_eq!(fx.saves(), 0);
        assert!(fx.board.pending().is_empty());
    }

    #[tokio::test]
    async fn daytime_firing_notifies_resets_and_rearms() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(due(&fx.now));

        let outcome = handle_wakeup(&fx.state, timer.id).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Handled { saved: true, waiting: false });

        let stored = fx.store.inner.get(timer.id).unwrap().unwrap();
        let expected_next = fx.now.timestamp_millis() + 3_600_000 + 3;
        assert_eq!(stored.next_fire_at, expected_next);
        assert_eq!(
            fx.wakeups.requests(),
            vec![ArmRequest::Arm { id: timer.id, at_ms: expected_next, repeat_ms: 300_000 }]
        );
        let pending = fx.board.pending();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].plan.night);
    }

    #[tokio::test]
    async fn edit_and_firing_of_one_timer_are_serialized() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(due(&fx.now));
        let edit = TimerEdit {
            name: Some("Tea".into()),
            day_led: Some(false),
            ..TimerEdit::default()
        };
        let wait = std::time::Duration::from_millis(50);

        // Someone else is between loading and saving this timer
        let guard = fx.state.lock_timer(timer.id).await.unwrap();
        assert!(tokio::time::timeout(wait, handle_wakeup(&fx.state, timer.id)).await.is_err());
        assert!(tokio::time::timeout(wait, fx.state.edit_timer(timer.id, edit.clone())).await.is_err());
        assert_eq!(fx.saves(), 0);
        assert!(fx.board.pending().is_empty());
        drop(guard);

        let (fired, edited) = tokio::join!(
            handle_wakeup(&fx.state, timer.id),
            fx.state.edit_timer(timer.id, edit),
        );
        assert_eq!(fired.unwrap(), WakeupOutcome::Handled { saved: true, waiting: false });
        edited.unwrap();

        let stored = fx.store.inner.get(timer.id).unwrap().unwrap();
        assert_eq!(stored.name, "Tea");
        assert!(!stored.day_led);
        assert_eq!(stored.next_fire_at, fx.now.timestamp_millis() + 3_600_000 + 3);
        assert_eq!(fx.saves(), 2);
    }

    #[tokio::test]
    async fn night_firing_waits_without_saving() {
        let fx = Fixture::at_hour(3);
        let timer = fx.insert(due(&fx.now));

        let outcome = handle_wakeup(&fx.state, timer.id).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Handled { saved: false, waiting: true });
        assert_eq!(fx.saves(), 0);
        assert!(fx.wakeups.requests().is_empty());
        assert!(fx.board.pending()[0].plan.night);
    }

    #[tokio::test]
    async fn night_override_is_consumed_and_saved() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(Timer {
            night_next: true,
            ..due(&fx.now)
        });

        let outcome = handle_wakeup(&fx.state, timer.id).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Handled { saved: true, waiting: true });
        let stored = fx.store.inner.get(timer.id).unwrap().unwrap();
        assert!(!stored.night_next);
        assert_eq!(stored.next_fire_at, timer.next_fire_at);
        assert!(fx.board.pending()[0].plan.night);
    }

    #[tokio::test]
    async fn disabled_timer_is_cleared_and_disarmed() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(Timer {
            enabled: false,
            ..due(&fx.now)
        });
        fx.board.post(timer.id, &crate::state::NotificationPlan {
            title: "stale".into(),
            sound: None,
            use_led: false,
            led_on_ms: 250,
            led_off_ms: 1250,
            led_argb: 0,
            persistent: true,
            night: false,
            when_ms: 0,
        });

        let outcome = handle_wakeup(&fx.state, timer.id).await.unwrap();
        assert_eq!(outcome, WakeupOutcome::Handled { saved: false, waiting: false });
        assert!(fx.board.pending().is_empty());
        assert_eq!(fx.wakeups.requests(), vec![ArmRequest::Disarm { id: timer.id }]);
    }

    #[tokio::test]
    async fn zero_interval_keeps_advancing() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(Timer {
            interval_secs: 0,
            ..due(&fx.now)
        });
        for _ in 0..2 {
            handle_wakeup(&fx.state, timer.id).await.unwrap();
        }
        let stored = fx.store.inner.get(timer.id).unwrap().unwrap();
        assert_eq!(stored.next_fire_at, fx.now.timestamp_millis() + 3);
        assert_eq!(fx.saves(), 2);
    }

    #[tokio::test]
    async fn store_failure_aborts_without_rearming() {
        let fx = Fixture::build(12, true);
        assert!(matches!(
            handle_wakeup(&fx.state, 1).await,
            Err(TimerError::Store(_))
        ));
        assert!(fx.wakeups.requests().is_empty());
        assert_eq!(handle_wakeup_payload(&fx.state, "1").await, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_discarded() {
        let fx = Fixture::at_hour(12);
        assert_eq!(handle_wakeup_payload(&fx.state, "not-a-number").await, None);
        assert_eq!(handle_wakeup_payload(&fx.state, "timer:5").await, Some(WakeupOutcome::Missing));
    }

    #[test]
    fn rearm_all_skips_disabled_and_continues_past_failures() {
        let fx = Fixture::at_hour(12);
        // ids start at 1, so the failing id 13 is one of the enabled ones
        for i in 0..14 {
            fx.insert(Timer {
                enabled: i % 2 == 0,
                ..due(&fx.now)
            });
        }
        let report = rearm_all(&fx.state).unwrap();
        assert_eq!(report, RearmReport { rearmed: 6, skipped: 7, failed: 1 });
        assert!(fx.board.pending().is_empty());
        assert_eq!(fx.saves(), 0);
        assert!(fx.wakeups.requests().iter().all(|r| matches!(r, ArmRequest::Arm { .. })));
    }

    #[test]
    fn condition_compares_against_the_scheduled_instant() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(Timer {
            next_fire_at: (fx.now - Duration::minutes(20)).timestamp_millis(),
            ..due(&fx.now)
        });
        assert_eq!(query_condition(&fx.state, timer.id, 15).unwrap(), ConditionState::Satisfied);
        assert_eq!(query_condition(&fx.state, timer.id, 30).unwrap(), ConditionState::Unsatisfied);
        assert_eq!(query_condition(&fx.state, 404, 0).unwrap(), ConditionState::Unknown);
        assert_eq!(fx.saves(), 0);
    }

    #[test]
    fn malformed_condition_query_is_unknown() {
        let fx = Fixture::at_hour(12);
        let timer = fx.insert(due(&fx.now));
        let id = timer.id.to_string();
        assert_eq!(query_condition_payload(&fx.state, "x", Some("5")), ConditionState::Unknown);
        assert_eq!(query_condition_payload(&fx.state, &id, None), ConditionState::Unknown);
        assert_eq!(query_condition_payload(&fx.state, &id, Some("0")), ConditionState::Satisfied);
    }

    #[test]
    fn parse_timer_id_accepts_scheme_prefix() {
        assert_eq!(parse_timer_id(" 12 ").unwrap(), 12);
        assert_eq!(parse_timer_id("timer:7").unwrap(), 7);
        assert!(matches!(parse_timer_id(""), Err(TimerError::MalformedEvent(_))));
    }
}
