use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use eduforall_core::new_id;

use super::{Account, Identity, Role};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated,
    Expired,
    LoggedOut,
}

/// Why a session was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Expired,
    LoggedOut,
}

/// Result of the per-request idle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// `last_activity` was refreshed.
    Active,
    /// Authenticated and idle past the threshold. Caller must flush.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A one-shot message shown on the next page view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

/// Server-side session attributes, keyed by an opaque id sent as a cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_role: Option<Role>,

    /// Absent in records written before the flag existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,

    /// Selects the long-lived expiry window.
    #[serde(default)]
    pub remember_me: bool,

    /// Absolute expiry, recomputed by the store on every save.
    pub expires_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flash: Vec<Flash>,

    /// Id this session replaced on flush; its record must be deleted.
    #[serde(skip)]
    pub retired_id: Option<String>,

    #[serde(skip)]
    pub ended: Option<SessionEnd>,
}

impl Session {
    /// A fresh anonymous session.
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            user_id: None,
            user_name: None,
            user_email: None,
            user_role: None,
            logged_in: None,
            last_activity: None,
            remember_me: false,
            expires_at,
            flash: Vec::new(),
            retired_id: None,
            ended: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.logged_in == Some(true) && self.user_id.is_some() && self.user_role.is_some()
    }

    pub fn state(&self) -> SessionState {
        match self.ended {
            Some(SessionEnd::Expired) if !self.is_authenticated() => SessionState::Expired,
            Some(SessionEnd::LoggedOut) if !self.is_authenticated() => SessionState::LoggedOut,
            _ if self.is_authenticated() => SessionState::Authenticated,
            _ => SessionState::Anonymous,
        }
    }

    /// Nothing worth persisting: no identity and no pending flash.
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.flash.is_empty()
    }

    /// Upgrade a record created before `logged_in` existed by inferring the
    /// flag from the presence of a user id. Returns true if changed.
    pub fn upgrade_legacy(&mut self) -> bool {
        if self.logged_in.is_none() && self.user_id.is_some() {
            self.logged_in = Some(true);
            return true;
        }
        false
    }

    /// Idle check, run once per request.
    ///
    /// An authenticated session idle for longer than `idle_timeout` is
    /// reported as expired and left untouched. Otherwise `last_activity`
    /// moves to `now`.
    pub fn touch(&mut self, now: DateTime<Utc>, idle_timeout: Duration) -> Activity {
        if self.logged_in == Some(true) {
            if let Some(last) = self.last_activity {
                if now - last > idle_timeout {
                    return Activity::Expired;
                }
            }
        }
        self.last_activity = Some(now);
        Activity::Active
    }

    /// Record a successful login or registration. The session moves to a
    /// new id so an id handed out before authentication stops working.
    pub fn establish(&mut self, account: &Account, remember_me: bool, now: DateTime<Utc>) {
        self.rotate_id();
        self.user_id = Some(account.id().to_string());
        self.user_name = Some(account.display_name());
        self.user_email = Some(account.email().to_string());
        self.user_role = Some(account.role());
        self.logged_in = Some(true);
        self.remember_me = remember_me;
        self.last_activity = Some(now);
        self.ended = None;
    }

    /// Drop every attribute and move to a new id. The old id is kept in
    /// `retired_id` so the store can delete its record.
    pub fn flush(&mut self, reason: SessionEnd) {
        self.rotate_id();
        self.user_id = None;
        self.user_name = None;
        self.user_email = None;
        self.user_role = None;
        self.logged_in = None;
        self.last_activity = None;
        self.remember_me = false;
        self.flash.clear();
        self.ended = Some(reason);
    }

    // Only the first id replaced since the last save has a stored record.
    fn rotate_id(&mut self) {
        let old_id = std::mem::replace(&mut self.id, new_id());
        if self.retired_id.is_none() {
            self.retired_id = Some(old_id);
        }
    }

    pub fn push_flash(&mut self, level: FlashLevel, text: impl Into<String>) {
        self.flash.push(Flash {
            level,
            text: text.into(),
        });
    }

    /// Return and clear pending flash messages.
    pub fn take_flash(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flash)
    }

    pub fn info(&self) -> SessionInfo {
        if !self.is_authenticated() {
            return SessionInfo::default();
        }
        SessionInfo {
            logged_in: true,
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            user_role: self.user_role,
        }
    }
}

/// What `GET /session` reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionInfo {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<Role>,
}
