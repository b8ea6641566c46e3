mod auth;
mod courses;
mod dashboard;
mod enrollments;
mod inbox;
mod middleware;
mod newsletter;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Router;

use eduforall_core::ServiceError;

use crate::model::{Account, Mentor, Student};
use crate::service::SchoolService;
use crate::sessions::SessionStore;

pub use middleware::SessionHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub svc: Arc<SchoolService>,
    pub sessions: Arc<SessionStore>,
}

/// Build the complete school router. Every route runs inside the session
/// middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(auth::routes())
        .merge(courses::routes())
        .merge(enrollments::routes())
        .merge(inbox::routes())
        .merge(dashboard::routes())
        .merge(newsletter::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .with_state(state)
}

fn current_user(state: &AppState, session: &SessionHandle) -> Result<Account, ServiceError> {
    session.with(|s| state.svc.current_user(s))
}

fn require_student(state: &AppState, session: &SessionHandle) -> Result<Student, ServiceError> {
    session.with(|s| state.svc.require_student(s))
}

fn require_mentor(state: &AppState, session: &SessionHandle) -> Result<Mentor, ServiceError> {
    session.with(|s| state.svc.require_mentor(s))
}
