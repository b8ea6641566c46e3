use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use eduforall_core::ServiceError;

use crate::api::{current_user, require_student, AppState, SessionHandle};
use crate::model::{FlashLevel, ProgressInput, SendMessage};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/enrollments/{id}", get(get_enrollment))
        .route("/enrollments/{id}/progress", post(record_progress))
        .route("/enrollments/{id}/drop", post(drop_enrollment))
        .route(
            "/enrollments/{id}/messages",
            get(list_messages).post(send_message),
        )
}

/// GET /enrollments/{id}: enrollment, learning path and conversation.
async fn get_enrollment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let detail = state
        .svc
        .enrollment_detail(&who, &id)
        .map_err(ServiceError::from)?;
    let course = state
        .svc
        .get_course(&detail.enrollment.course_id)
        .map_err(ServiceError::from)?;
    let messages = state
        .svc
        .enrollment_messages(&who, &id)
        .map_err(ServiceError::from)?;
    Ok(Json(json!({
        "enrollment": detail.enrollment,
        "learning_path": detail.learning_path,
        "course": course,
        "messages": messages,
    })))
}

async fn record_progress(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Json(input): Json<ProgressInput>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let detail = state
        .svc
        .record_progress(&who, &id, input)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(detail)))
}

async fn drop_enrollment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let student = require_student(&state, &session)?;
    let enrollment = state
        .svc
        .drop_enrollment(&student, &id)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(enrollment)))
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let who = current_user(&state, &session)?;
    let messages = state
        .svc
        .enrollment_messages(&who, &id)
        .map_err(ServiceError::from)?;
    Ok(Json(json!({"items": messages})))
}

/// POST /enrollments/{id}/messages
async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Json(input): Json<SendMessage>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let who = current_user(&state, &session)?;
    let message = state
        .svc
        .send_message(&who, &id, input)
        .map_err(ServiceError::from)?;
    session.with(|s| {
        s.push_flash(FlashLevel::Success, "Message sent successfully!");
        Ok(())
    })?;
    Ok((StatusCode::CREATED, Json(json!(message))))
}
