//! Utility functions module
//!
//! Signal handling and wall-clock arithmetic used throughout the application.

pub mod signals;
pub mod time_of_day;

// Re-export main functions
pub use signals::{reload_signals, shutdown_signal};
pub use time_of_day::{fields_from_seconds, format_hhmm, format_hms, seconds_from_fields};
