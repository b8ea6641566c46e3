use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use eduforall_core::{ListParams, ServiceError};

use crate::api::{require_mentor, require_student, AppState, SessionHandle};
use crate::model::{CreateCourse, EnrollInput, FlashLevel};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/{id}", get(get_course))
        .route("/courses/{id}/enroll", post(enroll))
}

async fn list_courses(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = state.svc.list_courses(&params).map_err(ServiceError::from)?;
    Ok(Json(json!({
        "items": result.items,
        "total": result.total,
    })))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let course = state.svc.get_course(&id).map_err(ServiceError::from)?;
    Ok(Json(json!(course)))
}

/// POST /courses: mentors only.
async fn create_course(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(input): Json<CreateCourse>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let mentor = require_mentor(&state, &session)?;
    let course = state
        .svc
        .create_course(&mentor, input)
        .map_err(ServiceError::from)?;
    session.with(|s| {
        s.push_flash(
            FlashLevel::Success,
            format!("Course \"{}\" created successfully!", course.title),
        );
        Ok(())
    })?;
    Ok((StatusCode::CREATED, Json(json!(course))))
}

/// POST /courses/{id}/enroll: students only.
async fn enroll(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<String>,
    Json(input): Json<EnrollInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let student = require_student(&state, &session)?;
    let enrollment = state
        .svc
        .enroll(&student, &id, input)
        .map_err(ServiceError::from)?;
    let course = state.svc.get_course(&id).map_err(ServiceError::from)?;
    session.with(|s| {
        s.push_flash(
            FlashLevel::Success,
            format!("Successfully enrolled in {}!", course.title),
        );
        Ok(())
    })?;
    Ok((StatusCode::CREATED, Json(json!(enrollment))))
}
