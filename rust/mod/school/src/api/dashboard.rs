use axum::extract::{Extension, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use eduforall_core::ServiceError;

use crate::api::{require_mentor, require_student, AppState, SessionHandle};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/student", get(student_dashboard))
        .route("/dashboard/mentor", get(mentor_dashboard))
}

async fn student_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let student = require_student(&state, &session)?;
    let dash = state
        .svc
        .student_dashboard(&student)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(dash)))
}

async fn mentor_dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let mentor = require_mentor(&state, &session)?;
    let dash = state
        .svc
        .mentor_dashboard(&mentor)
        .map_err(ServiceError::from)?;
    Ok(Json(json!(dash)))
}
