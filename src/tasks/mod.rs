//! Background tasks module
//!
//! The dispatcher reacting to wakeups, boot/upgrade and automation queries,
//! plus the tasks that run alongside the HTTP server.

pub mod dispatcher;
pub mod edit_session;
pub mod upgrade_recovery;
pub mod wakeup_listener;

// Re-export main functions
pub use dispatcher::{
    handle_wakeup, handle_wakeup_payload, query_condition, query_condition_payload, rearm_all,
    ConditionState, RearmReport, WakeupOutcome,
};
pub use edit_session::{close_session, open_session};
pub use upgrade_recovery::upgrade_recovery_task;
pub use wakeup_listener::wakeup_dispatch_task;
