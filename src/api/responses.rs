//! API response structures

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    state::Timer,
    tasks::{ConditionState, RearmReport, WakeupOutcome},
    utils::{fields_from_seconds, format_hhmm, format_hms},
};

/// A timer together with the values a UI would display for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    pub remaining_secs: i64,
    /// Countdown as `H:MM:SS`
    pub remaining: String,
    /// Countdown as `[hours, minutes, seconds]`, hours capped at 99
    pub remaining_fields: (i64, i64, i64),
    /// Wall-clock time of the next firing, `HH:MM`
    pub next_at: String,
    /// Wall-clock time of the firing after that, when repeating
    pub then_at: Option<String>,
    pub night_window: String,
    /// Informational; does not consume the one-shot night override
    pub night_now: bool,
    pub session_open: bool,
}

impl TimerView {
    pub fn new(timer: Timer, now: &DateTime<FixedOffset>, session_open: bool) -> Self {
        let remaining_secs = timer.remaining_secs(now);
        let (next, then) = timer.upcoming_times(now);
        let clock = |at: DateTime<FixedOffset>| at.format("%H:%M").to_string();
        Self {
            remaining_secs,
            remaining: format_hms(remaining_secs),
            remaining_fields: fields_from_seconds(remaining_secs),
            next_at: clock(next),
            then_at: then.map(clock),
            night_window: format!("{}-{}", format_hhmm(timer.night_start), format_hhmm(timer.night_stop)),
            night_now: timer.is_night(now),
            session_open,
            timer,
        }
    }
}

/// Response for timer mutations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: Option<TimerView>,
}

impl ApiResponse {
    pub fn new(status: &str, message: String, timer: Option<TimerView>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    pub fn ok(message: String, timer: TimerView) -> Self {
        Self::new("ok", message, Some(timer))
    }

    pub fn removed(message: String) -> Self {
        Self::new("removed", message, None)
    }
}

/// Response for inbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Option<WakeupOutcome>,
    pub rearm: Option<RearmReport>,
}

impl EventResponse {
    pub fn wakeup(outcome: Option<WakeupOutcome>) -> Self {
        Self {
            status: if outcome.is_some() { "handled" } else { "discarded" }.to_string(),
            timestamp: Utc::now(),
            outcome,
            rearm: None,
        }
    }

    pub fn rearm(report: RearmReport) -> Self {
        Self {
            status: "handled".to_string(),
            timestamp: Utc::now(),
            outcome: None,
            rearm: Some(report),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResponse {
    pub timer: String,
    pub minutes: Option<String>,
    pub condition: ConditionState,
}

/// Status response with scheduler information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub enabled: usize,
    pub open_sessions: Vec<i64>,
    pub pending_notifications: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_event: Option<String>,
    pub last_event_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
