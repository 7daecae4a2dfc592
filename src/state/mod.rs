//! State management module
//!
//! The timer record with its scheduling decisions, user edits, firing
//! outcomes, edit sessions and the shared application state.

pub mod app_state;
pub mod edit;
pub mod notification;
pub mod session;
pub mod timer;

// Re-export main types
pub use app_state::{AppState, DispatchSettings};
pub use edit::{EditEffects, TimerEdit};
pub use notification::{ArmRequest, NotificationOutcome, NotificationPlan};
pub use session::{SessionCommand, SessionRegistry};
pub use timer::{Timer, Tone, UNSAVED_ID};
