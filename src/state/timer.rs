//! Timer record and its scheduling decisions

use chrono::{DateTime, Duration, TimeZone};
use serde::{Deserialize, Serialize};

use super::notification::{
    ArmRequest, NotificationOutcome, NotificationPlan, LED_ARGB, LED_OFF_MS, LED_ON_MS,
};
use crate::utils::time_of_day::{in_window, second_of_day};

/// Id of a timer that has never been saved
pub const UNSAVED_ID: i64 = -1;

/// Forward nudge applied on every reset so a firing never lands on the same tick twice
pub const RESET_EPSILON_MS: i64 = 3;

pub const DEFAULT_INTERVAL_SECS: i64 = 4 * 60 * 60;
pub const DEFAULT_NIGHT_START: i64 = 0;
pub const DEFAULT_NIGHT_STOP: i64 = 8 * 60 * 60;

/// Stored name of the system default sound
pub const DEFAULT_TONE: &str = "default";

/// Sound reference for one period; absence means silent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    SystemDefault,
    Sound(String),
}

impl Tone {
    /// Interpret a user or API choice; `""` and `"silent"` mean no sound
    pub fn parse_choice(choice: &str) -> Option<Tone> {
        match choice.trim() {
            "" | "silent" => None,
            other => Some(Tone::from(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Tone::SystemDefault => DEFAULT_TONE,
            Tone::Sound(uri) => uri,
        }
    }
}

impl From<String> for Tone {
    fn from(s: String) -> Self {
        if s == DEFAULT_TONE {
            Tone::SystemDefault
        } else {
            Tone::Sound(s)
        }
    }
}

impl From<Tone> for String {
    fn from(tone: Tone) -> Self {
        tone.as_str().to_string()
    }
}

/// One recurring reminder.
///
/// `next_fire_at` is milliseconds since the epoch while `enabled`; while
/// disabled it holds the remaining countdown in milliseconds instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub next_fire_at: i64,
    pub interval_secs: i64,
    /// Seconds of the local day, in `[0, 86400)`
    pub night_start: i64,
    pub night_stop: i64,
    /// Treat the next firing as night regardless of the clock
    pub night_next: bool,
    pub day_tone: Option<Tone>,
    pub night_tone: Option<Tone>,
    pub day_led: bool,
    pub night_led: bool,
    pub day_wait: bool,
    pub night_wait: bool,
    pub seen: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self {
            id: UNSAVED_ID,
            name: String::new(),
            enabled: false,
            next_fire_at: 0,
            interval_secs: DEFAULT_INTERVAL_SECS,
            night_start: DEFAULT_NIGHT_START,
            night_stop: DEFAULT_NIGHT_STOP,
            night_next: false,
            day_tone: Some(Tone::SystemDefault),
            night_tone: None,
            day_led: true,
            night_led: false,
            day_wait: true,
            night_wait: true,
            seen: false,
        }
    }
}

impl Timer {
    /// Create a timer with default settings and the given label
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id != UNSAVED_ID
    }

    /// Label used for notifications
    pub fn title(&self) -> &str {
        if self.name.is_empty() {
            "Timer"
        } else {
            &self.name
        }
    }

    /// Whether a firing at `now` gets the night treatment.
    ///
    /// Reading the one-shot override here does not consume it.
    pub fn is_night<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        if self.night_next {
            return true;
        }
        in_window(second_of_day(now), self.night_start, self.night_stop)
    }

    /// Whether a firing at `now` should be left pending instead of re-armed
    pub fn should_wait<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        if self.is_night(now) {
            self.night_wait
        } else {
            self.day_wait
        }
    }

    /// Schedule the next firing one interval after `now`
    pub fn reset<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        let base = if self.enabled { now.timestamp_millis() } else { 0 };
        self.next_fire_at = base
            .saturating_add(self.interval_secs.max(0).saturating_mul(1000))
            .saturating_add(RESET_EPSILON_MS);
        self.seen = false;
    }

    /// Decide the notification for a firing at `now`, consuming the night override
    pub fn compute_notification<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> NotificationOutcome {
        if !self.enabled {
            return NotificationOutcome::DisarmOnly;
        }
        let night = self.is_night(now);
        self.night_next = false;
        let (sound, use_led) = if night {
            (self.night_tone.clone(), self.night_led)
        } else {
            (self.day_tone.clone(), self.day_led)
        };
        NotificationOutcome::Post(NotificationPlan {
            title: self.title().to_string(),
            sound,
            use_led,
            led_on_ms: LED_ON_MS,
            led_off_ms: LED_OFF_MS,
            led_argb: LED_ARGB,
            persistent: true,
            night,
            when_ms: self.next_fire_at,
        })
    }

    /// Wakeup registration matching the current state
    pub fn compute_next_alarm(&self, repeat_guard_ms: i64) -> ArmRequest {
        if self.enabled {
            ArmRequest::Arm {
                id: self.id,
                at_ms: self.next_fire_at,
                repeat_ms: repeat_guard_ms,
            }
        } else {
            ArmRequest::Disarm { id: self.id }
        }
    }

    /// Seconds left on the countdown; a disabled timer reports its stored duration
    pub fn remaining_secs<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> i64 {
        if self.enabled {
            let ms = self.next_fire_at.saturating_sub(now.timestamp_millis());
            ((ms as f64) / 1000.0).round().max(0.0) as i64
        } else {
            self.next_fire_at / 1000
        }
    }

    /// Whether `now` is at least `minutes` past the scheduled firing
    pub fn is_late_by_mins<Tz: TimeZone>(&self, now: &DateTime<Tz>, minutes: i64) -> bool {
        now.timestamp_millis().saturating_sub(self.next_fire_at) >= minutes.saturating_mul(60_000)
    }

    /// Wall-clock instants of the next firing and, if repeating, the one after.
    ///
    /// Instants past the representable calendar are clamped to `now` for the
    /// first firing and dropped for the second.
    pub fn upcoming_times<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> (DateTime<Tz>, Option<DateTime<Tz>>) {
        let first = if self.enabled {
            now.timezone().timestamp_millis_opt(self.next_fire_at).single()
        } else {
            Duration::try_milliseconds(self.next_fire_at).and_then(|d| now.clone().checked_add_signed(d))
        }
        .unwrap_or_else(|| now.clone());
        let second = (self.interval_secs > 0)
            .then_some(self.interval_secs)
            .and_then(Duration::try_seconds)
            .and_then(|d| first.clone().checked_add_signed(d));
        (first, second)
    }
}
