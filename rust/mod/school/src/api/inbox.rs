use axum::extract::{Extension, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use eduforall_core::ServiceError;

use crate::api::{current_user, AppState, SessionHandle};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list_messages))
        .route("/messages/{id}/read", post(mark_message_read))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
}

#[derive(Debug, Default, Deserialize)]
struct InboxQuery {
    #[serde(default)]
    unread: bool,
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(q): Query<InboxQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let items = state
        .svc
        .list_messages(&who, q.unread)
        .map_err(ServiceError::from)?;
    Ok(Json(json!({"items": items})))
}

async fn mark_message_read(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let message = state
        .svc
        .mark_message_read(&who, &id)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(message)))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Query(q): Query<InboxQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let items = state
        .svc
        .list_notifications(&who, q.unread)
        .map_err(ServiceError::from)?;
    Ok(Json(json!({"items": items})))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let notification = state
        .svc
        .mark_notification_read(&who, &id)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(notification)))
}
