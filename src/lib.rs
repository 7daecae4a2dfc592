//! Night Timer - A recurring-reminder daemon with day/night aware notifications
//!
//! This library provides the timer scheduling and notification-decision engine,
//! the dispatcher that reacts to wakeups and boot/upgrade events, and the
//! collaborators (SQLite store, in-process wakeups, notification board) that
//! back the daemon.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{StoreError, TimerError};
pub use state::{AppState, Timer};
pub use utils::signals::shutdown_signal;
