//! Route registration: module routes plus system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

/// Merge module routers and the public system endpoints.
pub fn build_router(module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        tracing::debug!(module = name, "mounting routes");
        app = app.merge(router);
    }
    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "eduforalld",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
