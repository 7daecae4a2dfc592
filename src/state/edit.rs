//! User edits applied to a timer working copy

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::timer::{Timer, Tone, RESET_EPSILON_MS};
use crate::utils::time_of_day::{normalize_second_of_day, seconds_from_fields};

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerEdit {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    /// Countdown until the next firing, in seconds
    pub next_in_secs: Option<i64>,
    /// Countdown as `[hours, minutes, seconds]`; ignored when `next_in_secs` is set
    pub next_in_hms: Option<(i64, i64, i64)>,
    pub interval_secs: Option<i64>,
    /// Interval as `[hours, minutes, seconds]`; ignored when `interval_secs` is set
    pub interval_hms: Option<(i64, i64, i64)>,
    pub night_start: Option<i64>,
    pub night_stop: Option<i64>,
    pub night_next: Option<bool>,
    /// `"silent"`, `"default"` or a sound reference
    pub day_tone: Option<String>,
    pub night_tone: Option<String>,
    pub day_led: Option<bool>,
    pub night_led: Option<bool>,
    pub day_wait: Option<bool>,
    pub night_wait: Option<bool>,
}

/// Collaborator work an edit leaves behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditEffects {
    pub rearm: bool,
    pub cancel_notification: bool,
}

impl EditEffects {
    fn merge(self, other: EditEffects) -> EditEffects {
        EditEffects {
            rearm: self.rearm || other.rearm,
            cancel_notification: self.cancel_notification || other.cancel_notification,
        }
    }
}

impl Timer {
    /// Switch scheduling on or off, carrying the remaining countdown across
    pub fn set_enabled<Tz: TimeZone>(&mut self, enabled: bool, now: &DateTime<Tz>) -> EditEffects {
        if self.enabled == enabled {
            return EditEffects::default();
        }
        let mut secs = self.remaining_secs(now);
        if secs <= 0 {
            secs = secs.saturating_add(self.interval_secs.max(0));
        }
        let countdown_ms = secs.max(0).saturating_mul(1000);
        self.enabled = enabled;
        self.next_fire_at = if enabled {
            now.timestamp_millis()
                .saturating_add(countdown_ms)
                .saturating_add(RESET_EPSILON_MS)
        } else {
            countdown_ms
        };
        EditEffects {
            rearm: true,
            cancel_notification: !enabled,
        }
    }

    /// Set the countdown until the next firing
    pub fn set_next_in<Tz: TimeZone>(&mut self, secs: i64, now: &DateTime<Tz>) -> EditEffects {
        let secs = secs.max(0);
        let base = if self.enabled {
            now.timestamp_millis() - RESET_EPSILON_MS
        } else {
            0
        };
        self.next_fire_at = secs.saturating_mul(1000).saturating_add(base);
        EditEffects {
            rearm: true,
            cancel_notification: secs > 0,
        }
    }

    /// Change the repeat interval; an already-pending future firing is re-armed
    pub fn set_interval<Tz: TimeZone>(&mut self, secs: i64, now: &DateTime<Tz>) -> EditEffects {
        self.interval_secs = secs.max(0);
        EditEffects {
            rearm: self.next_fire_at > now.timestamp_millis(),
            cancel_notification: false,
        }
    }

    /// Apply every field present in `edit`
    pub fn apply_edit<Tz: TimeZone>(&mut self, edit: &TimerEdit, now: &DateTime<Tz>) -> EditEffects {
        let mut effects = EditEffects::default();

        if let Some(name) = &edit.name {
            self.name = name.clone();
        }
        let from_fields = |(h, m, s): (i64, i64, i64)| seconds_from_fields(h, m, s);
        if let Some(secs) = edit.interval_secs.or(edit.interval_hms.map(from_fields)) {
            effects = effects.merge(self.set_interval(secs, now));
        }
        if let Some(secs) = edit.next_in_secs.or(edit.next_in_hms.map(from_fields)) {
            effects = effects.merge(self.set_next_in(secs, now));
        }
        if let Some(enabled) = edit.enabled {
            effects = effects.merge(self.set_enabled(enabled, now));
        }
        if let Some(start) = edit.night_start {
            self.night_start = normalize_second_of_day(start);
        }
        if let Some(stop) = edit.night_stop {
            self.night_stop = normalize_second_of_day(stop);
        }
        if let Some(flag) = edit.night_next {
            self.night_next = flag;
        }
        if let Some(choice) = &edit.day_tone {
            self.day_tone = Tone::parse_choice(choice);
        }
        if let Some(choice) = &edit.night_tone {
            self.night_tone = Tone::parse_choice(choice);
        }
        if let Some(v) = edit.day_led {
            self.day_led = v;
        }
        if let Some(v) = edit.night_led {
            self.night_led = v;
        }
        if let Some(v) = edit.day_wait {
            self.day_wait = v;
        }
        if let Some(v) = edit.night_wait {
            self.night_wait = v;
        }

        effects
    }
}
