//! HTTP endpoint handlers

use std::{collections::HashMap, sync::Arc};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    services::PendingNotification,
    state::{AppState, Timer, TimerEdit},
    tasks::{close_session, handle_wakeup_payload, open_session, query_condition_payload, rearm_all},
};
use super::responses::{
    ApiResponse, ConditionResponse, EventResponse, HealthResponse, StatusResponse, TimerView,
};

type HandlerResult<T> = Result<Json<T>, StatusCode>;

/// Body of `POST /timers`
#[derive(Debug, Default, Deserialize)]
pub struct CreateTimer {
    pub name: Option<String>,
}

fn status_for(e: &TimerError) -> StatusCode {
    match e {
        TimerError::NotFound(_) => StatusCode::NOT_FOUND,
        TimerError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
        TimerError::SessionClosed(_) => StatusCode::CONFLICT,
        TimerError::Store(_) | TimerError::Wakeup(_) | TimerError::Lock(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn fail(action: &str, e: TimerError) -> StatusCode {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Failed to {}: {}", action, e);
    } else {
        warn!("Failed to {}: {}", action, e);
    }
    status
}

fn view(state: &AppState, timer: Timer) -> TimerView {
    let open = state.sessions.is_open(timer.id);
    TimerView::new(timer, &state.now(), open)
}

/// Handle GET /timers - List all timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> HandlerResult<Vec<TimerView>> {
    let timers = state.list_timers().map_err(|e| fail("list timers", e))?;
    Ok(Json(timers.into_iter().map(|t| view(&state, t)).collect()))
}

/// Handle POST /timers - Add a timer with default settings
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateTimer>>,
) -> HandlerResult<ApiResponse> {
    let name = body.and_then(|Json(b)| b.name);
    let timer = state.create_timer(name).map_err(|e| fail("create timer", e))?;
    Ok(Json(ApiResponse::ok(format!("Timer {} created", timer.id), view(&state, timer))))
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult<TimerView> {
    let timer = state.get_timer(id).await.map_err(|e| fail("load timer", e))?;
    Ok(Json(view(&state, timer)))
}

/// Handle PATCH /timers/:id - Apply an edit
pub async fn edit_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(edit): Json<TimerEdit>,
) -> HandlerResult<ApiResponse> {
    let timer = state.edit_timer(id, edit).await.map_err(|e| fail("edit timer", e))?;
    Ok(Json(ApiResponse::ok(format!("Timer {} updated", id), view(&state, timer))))
}

/// Handle DELETE /timers/:id - Disarm and remove a timer
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult<ApiResponse> {
    state.remove_timer(id).await.map_err(|e| fail("remove timer", e))?;
    Ok(Json(ApiResponse::removed(format!("Timer {} removed", id))))
}

/// Handle POST /timers/:id/seen - Acknowledge the pending firing
pub async fn seen_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult<ApiResponse> {
    let timer = state.mark_seen(id).await.map_err(|e| fail("acknowledge timer", e))?;
    Ok(Json(ApiResponse::ok(format!("Timer {} acknowledged", id), view(&state, timer))))
}

/// Handle POST /timers/:id/session - Open a foreground edit session
pub async fn open_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult<ApiResponse> {
    let timer = open_session(&state, id).await.map_err(|e| fail("open edit session", e))?;
    info!("Edit session endpoint called for timer {}", id);
    Ok(Json(ApiResponse::ok(format!("Editing timer {}", id), view(&state, timer))))
}

/// Handle DELETE /timers/:id/session - Close the session, saving pending edits
pub async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult<ApiResponse> {
    let timer = close_session(&state, id).await.map_err(|e| fail("close edit session", e))?;
    Ok(Json(ApiResponse::ok(format!("Finished editing timer {}", id), view(&state, timer))))
}

/// Handle GET /timers/:id/condition?minutes=N - Automation condition query
pub async fn condition_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<ConditionResponse> {
    let minutes = params.get("minutes").cloned();
    let condition = query_condition_payload(&state, &raw_id, minutes.as_deref());
    Json(ConditionResponse {
        timer: raw_id,
        minutes,
        condition,
    })
}

/// Handle POST /events/wakeup/:id - Wakeup delivered from outside the process
pub async fn wakeup_event_handler(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> (StatusCode, Json<EventResponse>) {
    let outcome = handle_wakeup_payload(&state, &raw_id).await;
    let status = if outcome.is_some() { StatusCode::OK } else { StatusCode::ACCEPTED };
    (status, Json(EventResponse::wakeup(outcome)))
}

/// Handle POST /events/boot - Re-arm every enabled timer
pub async fn boot_event_handler(State(state): State<Arc<AppState>>) -> HandlerResult<EventResponse> {
    let report = rearm_all(&state).map_err(|e| fail("re-arm timers", e))?;
    Ok(Json(EventResponse::rearm(report)))
}

/// Handle GET /notifications - Currently displayed notifications
pub async fn notifications_handler(State(state): State<Arc<AppState>>) -> Json<Vec<PendingNotification>> {
    Json(state.notifier.pending())
}

/// Handle GET /status - Return current scheduler status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> HandlerResult<StatusResponse> {
    let timers = state.list_timers().map_err(|e| fail("load timers", e))?;
    let (last_event, last_event_time) = state.get_last_event();

    Ok(Json(StatusResponse {
        timers: timers.len(),
        enabled: timers.iter().filter(|t| t.enabled).count(),
        open_sessions: state.sessions.open_ids(),
        pending_notifications: state.notifier.pending().len(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_event,
        last_event_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
