//! Outcomes of the firing decision: what to show and what to arm

use serde::{Deserialize, Serialize};

use super::timer::Tone;

pub const LED_ON_MS: u32 = 250;
pub const LED_OFF_MS: u32 = 1250;
pub const LED_ARGB: u32 = 0xff22_22ff;

/// Parameters for one displayed notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPlan {
    pub title: String,
    /// `None` plays nothing
    pub sound: Option<Tone>,
    pub use_led: bool,
    pub led_on_ms: u32,
    pub led_off_ms: u32,
    pub led_argb: u32,
    /// Not dismissable by a "clear all"
    pub persistent: bool,
    /// Whether the night treatment was applied
    pub night: bool,
    /// Scheduled instant of the firing, ms since epoch
    pub when_ms: i64,
}

/// What the notification collaborator should do for a firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Post(NotificationPlan),
    /// Timer is disabled: withdraw anything displayed and stop its wakeups
    DisarmOnly,
}

/// Request for the wakeup collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ArmRequest {
    Arm { id: i64, at_ms: i64, repeat_ms: i64 },
    Disarm { id: i64 },
}
