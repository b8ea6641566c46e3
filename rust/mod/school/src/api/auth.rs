use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use eduforall_core::ServiceError;

use crate::api::{current_user, AppState, SessionHandle};
use crate::model::{LoginInput, RegisterInput};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/session", get(session_info))
        .route("/me", get(me))
        .route("/flash", get(flash))
        .route("/mentors", get(list_mentors))
}

/// GET /login: pending messages plus whether someone is already logged in.
async fn login_page(
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (info, messages) = session.with(|s| Ok((s.info(), s.take_flash())))?;
    Ok(Json(json!({"session": info, "messages": messages})))
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(input): Json<LoginInput>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (account, info) = session.with(|s| {
        let account = state.svc.login(s, input)?;
        Ok((account, s.info()))
    })?;
    Ok(Json(json!({"user": account.profile(), "session": info})))
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), ServiceError> {
    let (account, info) = session.with(|s| {
        let account = state.svc.register(s, input)?;
        Ok((account, s.info()))
    })?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"user": account.profile(), "session": info})),
    ))
}

/// POST /logout: always succeeds.
async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<StatusCode, ServiceError> {
    session.with(|s| {
        state.svc.logout(s);
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

async fn session_info(
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let info = session.with(|s| Ok(s.info()))?;
    Ok(Json(json!(info)))
}

/// GET /me: profile of the logged-in account.
async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let account = current_user(&state, &session)?;
    Ok(Json(json!(account.profile())))
}

/// GET /flash: pending one-shot messages, cleared once read.
async fn flash(
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let messages = session.with(|s| Ok(s.take_flash()))?;
    Ok(Json(json!({"items": messages})))
}

async fn list_mentors(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let mentors = state.svc.list_mentors().map_err(ServiceError::from)?;
    Ok(Json(json!({"items": mentors})))
}
