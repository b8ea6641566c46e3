use axum::extract::{Extension, Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use eduforall_core::ServiceError;

use crate::api::{AppState, SessionHandle};
use crate::model::FlashLevel;
use crate::service::SchoolError;

const UNSUBSCRIBED: &str = "You have been unsubscribed from our newsletter";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .route("/newsletter/unsubscribe/{email}", post(unsubscribe))
}

#[derive(Debug, Default, Deserialize)]
struct SubscribeRequest {
    #[serde(default)]
    email: String,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let outcome = state.svc.subscribe(&req.email).map_err(ServiceError::from)?;
    Ok(Json(json!({
        "success": true,
        "message": "Thank you for subscribing to our newsletter!",
        "reactivated": outcome.reactivated,
    })))
}

/// POST /newsletter/unsubscribe/{email}: the outcome is also left as a flash.
async fn unsubscribe(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = state.svc.unsubscribe(&email);
    let flash = match &result {
        Ok(()) => Some((FlashLevel::Success, UNSUBSCRIBED.to_string())),
        Err(SchoolError::NotFound(m)) => Some((FlashLevel::Error, m.clone())),
        Err(_) => None,
    };
    if let Some((level, text)) = flash {
        session.with(|s| {
            s.push_flash(level, text);
            Ok(())
        })?;
    }
    result.map_err(ServiceError::from)?;
    Ok(Json(json!({"success": true, "message": UNSUBSCRIBED})))
}
