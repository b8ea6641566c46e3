use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use tracing::{debug, info};

use eduforall_core::ServiceError;

use crate::api::AppState;
use crate::model::{Activity, FlashLevel, Session, SessionEnd};
use crate::service::SchoolError;

const EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// The request's session, shared between the middleware and the handler.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Run `f` with the session locked.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Session) -> Result<R, SchoolError>,
    ) -> Result<R, ServiceError> {
        let mut session = self
            .0
            .lock()
            .map_err(|_| ServiceError::Internal("session lock poisoned".into()))?;
        f(&mut session).map_err(ServiceError::from)
    }

    fn snapshot(&self) -> Result<Session, ServiceError> {
        self.with(|s| Ok(s.clone()))
    }
}

/// Session and idle-timeout middleware.
///
/// Loads the session named by the cookie (or starts an anonymous one),
/// upgrades legacy records, then applies the idle check. An authenticated
/// session idle past the timeout is flushed and the request is redirected
/// to the login page with a warning. Otherwise the handler runs and the
/// session is written back afterwards.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let cookie_name = state.sessions.config().cookie_name.clone();
    let cookie_id = session_cookie(req.headers(), &cookie_name);

    let loaded = match &cookie_id {
        Some(id) => match state.sessions.load(id) {
            Ok(s) => s,
            Err(e) => return ServiceError::from(e).into_response(),
        },
        None => None,
    };
    let stored = loaded.is_some();
    let mut session = loaded.unwrap_or_else(|| state.sessions.create());

    if session.upgrade_legacy() {
        debug!("upgraded legacy session record");
    }

    if session.touch(Utc::now(), state.sessions.config().idle_timeout()) == Activity::Expired {
        info!(user = ?session.user_id, "session expired after inactivity");
        session.flush(SessionEnd::Expired);
        session.push_flash(FlashLevel::Warning, EXPIRED_MESSAGE);
        let mut resp = Redirect::to("/login").into_response();
        if let Err(e) = persist(&state, &mut session, cookie_id.as_deref(), stored, &mut resp) {
            return e.into_response();
        }
        return resp;
    }

    let handle = SessionHandle::new(session);
    req.extensions_mut().insert(handle.clone());
    let mut resp = next.run(req).await;

    let mut session = match handle.snapshot() {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = persist(&state, &mut session, cookie_id.as_deref(), stored, &mut resp) {
        return e.into_response();
    }
    resp
}

/// Write the session back and set or clear the cookie.
///
/// Anonymous sessions with nothing pending are not stored. A flushed
/// session's previous record is deleted.
fn persist(
    state: &AppState,
    session: &mut Session,
    cookie_id: Option<&str>,
    stored: bool,
    resp: &mut Response,
) -> Result<(), ServiceError> {
    let sessions = &state.sessions;

    if let Some(retired) = session.retired_id.take() {
        sessions.delete(&retired).map_err(ServiceError::from)?;
    }

    let cookie = if session.is_empty() {
        if stored && cookie_id == Some(session.id.as_str()) {
            sessions.delete(&session.id).map_err(ServiceError::from)?;
        }
        cookie_id.map(|_| sessions.config().clear_cookie())
    } else {
        sessions.save(session).map_err(ServiceError::from)?;
        Some(sessions.config().cookie_for(session))
    };

    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| ServiceError::Internal(format!("invalid cookie header: {}", e)))?;
        resp.headers_mut().append(SET_COOKIE, value);
    }
    Ok(())
}

/// Extract a cookie value from the request's `Cookie` headers.
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sessionid=abc123; x=1"));
        assert_eq!(session_cookie(&headers, "sessionid").as_deref(), Some("abc123"));
        assert_eq!(session_cookie(&headers, "other"), None);
    }

    #[test]
    fn empty_cookie_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("sessionid="));
        assert_eq!(session_cookie(&headers, "sessionid"), None);
    }
}
