//! Collaborator services
//!
//! Persistence, wakeup registration, notification display and the clock.
//! The dispatcher only sees the traits; the concrete types back the daemon.

pub mod clock;
pub mod notifier;
pub mod store;
pub mod wakeup;

// Re-export main types
pub use clock::{Clock, FixedClock, SystemClock};
pub use notifier::{NotificationBoard, NotificationService, PendingNotification};
pub use store::{SqliteStore, TimerStore};
pub use wakeup::{apply_arm_request, TokioWakeups, WakeupService};
