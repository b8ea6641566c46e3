use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use eduforall_kv::RedbStore;
use eduforall_sql::SqliteStore;

use super::*;
use crate::mail::testing::RecordingMailer;
use crate::model::Role;
use crate::sessions::SessionConfig;

fn app() -> (AppState, Router) {
    let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
    let kv = Arc::new(RedbStore::open_in_memory().unwrap());
    let state = AppState {
        svc: SchoolService::new(sql, Arc::new(RecordingMailer::default())).unwrap(),
        sessions: Arc::new(SessionStore::new(kv, SessionConfig::default())),
    };
    let router = build_router(state.clone());
    (state, router)
}

/// A browser: remembers the session cookie between requests.
struct Client {
    router: Router,
    cookie: Option<String>,
}

struct Reply {
    status: StatusCode,
    location: Option<String>,
    json: Value,
}

impl Client {
    fn new(router: &Router) -> Self {
        Self {
            router: router.clone(),
            cookie: None,
        }
    }

    async fn call(&mut self, method: &str, uri: &str, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        if let Some(id) = &self.cookie {
            builder = builder.header(COOKIE, format!("sessionid={}", id));
        }
        let body = match body {
            Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        for value in resp.headers().get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            if value.contains("Max-Age=0") {
                self.cookie = None;
            } else {
                let pair = value.split(';').next().unwrap();
                self.cookie = Some(pair.trim_start_matches("sessionid=").to_string());
            }
        }

        let status = resp.status();
        let location = resp
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            json!(null)
        } else {
            serde_json::from_slice(&bytes).unwrap_or(json!(null))
        };
        Reply {
            status,
            location,
            json,
        }
    }

    async fn register(&mut self, role: &str, email: &str) -> Value {
        let r = self
            .call(
                "POST",
                "/register",
                Some(json!({
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "email": email,
                    "phone_number": "555-0100",
                    "password": "pw123456",
                    "confirm_password": "pw123456",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(r.status, StatusCode::CREATED, "{}", r.json);
        r.json["user"].clone()
    }

    async fn flash_texts(&mut self) -> Vec<String> {
        let r = self.call("GET", "/flash", None).await;
        r.json["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["text"].as_str().unwrap().to_string())
            .collect()
    }
}

#[tokio::test]
async fn login_and_logout() {
    let (_, router) = app();
    let mut setup = Client::new(&router);
    setup.register("student", "a@x.com").await;

    let mut c = Client::new(&router);
    let r = c
        .call(
            "POST",
            "/login",
            Some(json!({"email": "a@x.com", "password": "pw123456", "role": "student"})),
        )
        .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["session"]["logged_in"], true);
    assert_eq!(r.json["session"]["user_role"], "student");
    assert_eq!(r.json["session"]["user_email"], "a@x.com");
    assert!(r.json["user"].get("password_hash").is_none());
    assert!(c.cookie.is_some());

    let r = c.call("GET", "/me", None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["email"], "a@x.com");

    let r = c.call("POST", "/logout", None).await;
    assert_eq!(r.status, StatusCode::NO_CONTENT);
    assert_eq!(
        c.flash_texts().await,
        ["You have been logged out successfully"]
    );

    let r = c.call("GET", "/me", None).await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.json["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn login_retires_the_pre_login_session_id() {
    let (state, router) = app();
    Client::new(&router).register("student", "a@x.com").await;

    // A stored anonymous session whose id someone else also knows.
    let mut planted = state.sessions.create();
    planted.push_flash(crate::model::FlashLevel::Info, "hello");
    state.sessions.save(&mut planted).unwrap();

    let mut victim = Client::new(&router);
    victim.cookie = Some(planted.id.clone());
    let r = victim
        .call(
            "POST",
            "/login",
            Some(json!({"email": "a@x.com", "password": "pw123456", "role": "student"})),
        )
        .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_ne!(victim.cookie.as_deref(), Some(planted.id.as_str()));
    assert!(state.sessions.load(&planted.id).unwrap().is_none());

    let mut other = Client::new(&router);
    other.cookie = Some(planted.id.clone());
    assert_eq!(other.call("GET", "/me", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(victim.call("GET", "/me", None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn bad_credentials() {
    let (_, router) = app();
    Client::new(&router).register("mentor", "m@x.com").await;

    let mut c = Client::new(&router);
    let r = c
        .call(
            "POST",
            "/login",
            Some(json!({"email": "m@x.com", "password": "wrong-one", "role": "mentor"})),
        )
        .await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.json["message"], "Invalid email or password");
    assert!(c.cookie.is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (_, router) = app();
    Client::new(&router).register("student", "a@x.com").await;

    let mut c = Client::new(&router);
    let r = c
        .call(
            "POST",
            "/register",
            Some(json!({
                "first_name": "B", "last_name": "C", "email": "a@x.com",
                "phone_number": "1", "password": "pw123456",
                "confirm_password": "pw123456", "role": "student",
            })),
        )
        .await;
    assert_eq!(r.status, StatusCode::CONFLICT);
    assert_eq!(r.json["message"], "A student with this email already exists");
}

#[tokio::test]
async fn idle_session_is_redirected_to_login() {
    let (state, router) = app();
    let mut c = Client::new(&router);
    c.register("student", "a@x.com").await;
    c.flash_texts().await;

    let old_id = c.cookie.clone().unwrap();
    let mut stored = state.sessions.load(&old_id).unwrap().unwrap();
    stored.last_activity = Some(Utc::now() - Duration::minutes(31));
    state.sessions.save(&mut stored).unwrap();

    let r = c.call("GET", "/me", None).await;
    assert_eq!(r.status, StatusCode::SEE_OTHER);
    assert_eq!(r.location.as_deref(), Some("/login"));
    assert_ne!(c.cookie.as_deref(), Some(old_id.as_str()));
    assert!(state.sessions.load(&old_id).unwrap().is_none());

    let r = c.call("GET", "/login", None).await;
    assert_eq!(r.json["session"]["logged_in"], false);
    assert_eq!(r.json["messages"][0]["level"], "warning");
    assert_eq!(
        r.json["messages"][0]["text"],
        "Your session has expired. Please log in again."
    );
}

#[tokio::test]
async fn active_session_is_refreshed() {
    let (state, router) = app();
    let mut c = Client::new(&router);
    c.register("student", "a@x.com").await;

    let id = c.cookie.clone().unwrap();
    let mut stored = state.sessions.load(&id).unwrap().unwrap();
    let stale = Utc::now() - Duration::minutes(29);
    stored.last_activity = Some(stale);
    state.sessions.save(&mut stored).unwrap();

    let r = c.call("GET", "/me", None).await;
    assert_eq!(r.status, StatusCode::OK);
    let refreshed = state.sessions.load(&id).unwrap().unwrap();
    assert!(refreshed.last_activity.unwrap() > stale);
}

#[tokio::test]
async fn legacy_session_is_accepted() {
    let (state, router) = app();
    let account = Client::new(&router).register("mentor", "m@x.com").await;

    // Written before the logged-in flag existed.
    let mut legacy = state.sessions.create();
    legacy.user_id = account["id"].as_str().map(str::to_string);
    legacy.user_role = Some(Role::Mentor);
    state.sessions.save(&mut legacy).unwrap();

    let mut c = Client::new(&router);
    c.cookie = Some(legacy.id.clone());
    let r = c.call("GET", "/me", None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["email"], "m@x.com");

    let upgraded = state.sessions.load(&legacy.id).unwrap().unwrap();
    assert_eq!(upgraded.logged_in, Some(true));
}

#[tokio::test]
async fn anonymous_requests_leave_no_session() {
    let (_, router) = app();
    let mut c = Client::new(&router);
    let r = c.call("GET", "/courses", None).await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["total"], 0);
    assert!(c.cookie.is_none());
}

#[tokio::test]
async fn enrollment_and_messaging() {
    let (_, router) = app();
    let mut mentor = Client::new(&router);
    let mentor_profile = mentor.register("mentor", "m@x.com").await;

    let r = mentor
        .call(
            "POST",
            "/courses",
            Some(json!({
                "title": "Geometry",
                "description": "Shapes",
                "start_date": "2026-02-01",
                "end_date": "2026-04-01",
                "course_type": "paid",
                "price": 20.0,
            })),
        )
        .await;
    assert_eq!(r.status, StatusCode::CREATED, "{}", r.json);
    let course_id = r.json["id"].as_str().unwrap().to_string();

    let mut student = Client::new(&router);
    student.register("student", "s@x.com").await;

    // Students may not author courses.
    let r = student
        .call("POST", "/courses", Some(json!({"title": "x"})))
        .await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = student
        .call(
            "POST",
            &format!("/courses/{}/enroll", course_id),
            Some(json!({
                "enrollment_type": "mentored",
                "mentor_id": mentor_profile["id"],
            })),
        )
        .await;
    assert_eq!(r.status, StatusCode::CREATED, "{}", r.json);
    let enrollment_id = r.json["id"].as_str().unwrap().to_string();

    let r = student
        .call("POST", &format!("/courses/{}/enroll", course_id), Some(json!({})))
        .await;
    assert_eq!(r.status, StatusCode::CONFLICT);
    assert_eq!(r.json["message"], "You are already enrolled in this course");

    let r = mentor.call("GET", "/notifications?unread=true", None).await;
    assert_eq!(r.json["items"][0]["title"], "New Student: Ada Lovelace");

    let r = student
        .call(
            "POST",
            &format!("/enrollments/{}/messages", enrollment_id),
            Some(json!({"subject": "Hello", "body": "When is the first lesson?"})),
        )
        .await;
    assert_eq!(r.status, StatusCode::CREATED);

    let r = mentor.call("GET", "/messages?unread=true", None).await;
    let message_id = r.json["items"][0]["id"].as_str().unwrap().to_string();
    let r = mentor
        .call("POST", &format!("/messages/{}/read", message_id), None)
        .await;
    assert_eq!(r.json["is_read"], true);

    let r = mentor
        .call(
            "POST",
            &format!("/enrollments/{}/progress", enrollment_id),
            Some(json!({"completed_lessons": 5})),
        )
        .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["enrollment"]["status"], "in_progress");

    let r = student.call("GET", "/dashboard/student", None).await;
    assert_eq!(r.json["total_courses"], 1);
    assert_eq!(r.json["average_progress"], 50.0);

    let r = mentor.call("GET", "/dashboard/mentor", None).await;
    assert_eq!(r.json["total_students"], 1);

    let r = student
        .call("GET", &format!("/enrollments/{}", enrollment_id), None)
        .await;
    assert_eq!(r.json["course"]["title"], "Geometry");
    assert_eq!(r.json["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn enroll_requires_student_login() {
    let (_, router) = app();
    let mut c = Client::new(&router);
    let r = c
        .call("POST", "/courses/whatever/enroll", Some(json!({})))
        .await;
    assert_eq!(r.status, StatusCode::UNAUTHORIZED);
    assert_eq!(r.json["message"], "Please log in as a student");
}

#[tokio::test]
async fn newsletter_round_trip() {
    let (_, router) = app();
    let mut c = Client::new(&router);

    let r = c
        .call("POST", "/newsletter/subscribe", Some(json!({"email": "n@x.com"})))
        .await;
    assert_eq!(r.status, StatusCode::OK);
    assert_eq!(r.json["success"], true);

    let r = c
        .call("POST", "/newsletter/subscribe", Some(json!({"email": "n@x.com"})))
        .await;
    assert_eq!(r.status, StatusCode::CONFLICT);

    let r = c
        .call("POST", "/newsletter/subscribe", Some(json!({"email": "bad"})))
        .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.json["message"], "Please enter a valid email address");

    let r = c.call("POST", "/newsletter/unsubscribe/n@x.com", None).await;
    assert_eq!(r.status, StatusCode::OK);

    let r = c.call("POST", "/newsletter/unsubscribe/ghost@x.com", None).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
    assert_eq!(
        c.flash_texts().await,
        [
            "You have been unsubscribed from our newsletter",
            "Email not found"
        ]
    );
}
