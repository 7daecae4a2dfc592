//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler).post(create_timer_handler))
        .route(
            "/timers/:id",
            get(get_timer_handler)
                .patch(edit_timer_handler)
                .delete(delete_timer_handler),
        )
        .route("/timers/:id/seen", post(seen_handler))
        .route(
            "/timers/:id/session",
            post(open_session_handler)
                .get(get_timer_handler)
                .patch(edit_timer_handler)
                .delete(close_session_handler),
        )
        .route("/timers/:id/condition", get(condition_handler))
        // Events from the wakeup facility and the service manager
        .route("/events/wakeup/:id", post(wakeup_event_handler))
        .route("/events/boot", post(boot_event_handler))
        .route("/notifications", get(notifications_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
