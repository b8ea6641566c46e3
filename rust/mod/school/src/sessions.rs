//! Session store: JSON session records in the KV store with lazy TTL.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use eduforall_kv::KVStore;

use crate::model::Session;
use crate::service::SchoolError;

const KEY_PREFIX: &str = "session:";

/// Session lifetimes and cookie settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cookie carrying the session id.
    pub cookie_name: String,
    /// Authenticated sessions idle longer than this are flushed (default: 30 min).
    pub idle_timeout_secs: i64,
    /// Server-side lifetime of an ordinary session (default: 24h).
    pub session_ttl_secs: i64,
    /// Server-side and cookie lifetime with remember-me (default: 1 week).
    pub remember_me_ttl_secs: i64,
    /// Add `Secure` to the cookie.
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sessionid".to_string(),
            idle_timeout_secs: 1800,     // 30 min
            session_ttl_secs: 86400,     // 24h
            remember_me_ttl_secs: 604800, // 7 days
            secure_cookie: false,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::seconds(self.idle_timeout_secs)
    }

    fn ttl(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::seconds(self.remember_me_ttl_secs)
        } else {
            Duration::seconds(self.session_ttl_secs)
        }
    }

    /// `Set-Cookie` value carrying the session id. Remember-me sessions get a
    /// persistent cookie; others last for the browser session.
    pub fn cookie_for(&self, session: &Session) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name, session.id
        );
        if session.remember_me {
            cookie.push_str(&format!("; Max-Age={}", self.remember_me_ttl_secs));
        }
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.cookie_name)
    }
}

pub struct SessionStore {
    kv: Arc<dyn KVStore>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KVStore>, config: SessionConfig) -> Self {
        Self { kv, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// A new, unsaved anonymous session.
    pub fn create(&self) -> Session {
        Session::new(Utc::now() + self.config.ttl(false))
    }

    /// Load a live session. Unreadable records are deleted and reported as
    /// absent.
    pub fn load(&self, id: &str) -> Result<Option<Session>, SchoolError> {
        self.load_at(id, Utc::now())
    }

    pub(crate) fn load_at(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, SchoolError> {
        let key = session_key(id);
        let Some(bytes) = self.kv.get(&key, now.timestamp())? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!("discarding unreadable session record: {}", e);
                self.kv.delete(&key)?;
                Ok(None)
            }
        }
    }

    /// Persist a session, sliding its expiry forward from now.
    pub fn save(&self, session: &mut Session) -> Result<(), SchoolError> {
        session.expires_at = Utc::now() + self.config.ttl(session.remember_me);
        let bytes = serde_json::to_vec(session)
            .map_err(|e| SchoolError::Internal(e.to_string()))?;
        self.kv
            .put(&session_key(&session.id), &bytes, session.expires_at.timestamp())?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), SchoolError> {
        if self.kv.delete(&session_key(id))? {
            debug!("deleted session record");
        }
        Ok(())
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, SchoolError> {
        Ok(self.kv.purge_expired(Utc::now().timestamp())?)
    }
}

fn session_key(id: &str) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eduforall_kv::RedbStore;

    fn store() -> SessionStore {
        let kv = Arc::new(RedbStore::open_in_memory().unwrap());
        SessionStore::new(kv, SessionConfig::default())
    }

    #[test]
    fn save_and_load() {
        let store = store();
        let mut s = store.create();
        s.user_id = Some("s1".into());
        store.save(&mut s).unwrap();

        let loaded = store.load(&s.id).unwrap().unwrap();
        assert_eq!(loaded.user_id.as_deref(), Some("s1"));
        assert!(store.load("missing").unwrap().is_none());
    }

    #[test]
    fn expiry_depends_on_remember_me() {
        let store = store();
        let mut short = store.create();
        store.save(&mut short).unwrap();
        let mut long = store.create();
        long.remember_me = true;
        store.save(&mut long).unwrap();

        let in_two_days = Utc::now() + Duration::days(2);
        assert!(store.load_at(&short.id, in_two_days).unwrap().is_none());
        assert!(store.load_at(&long.id, in_two_days).unwrap().is_some());
    }

    #[test]
    fn purge_removes_only_expired_records() {
        let store = store();
        let mut live = store.create();
        store.save(&mut live).unwrap();
        let mut remembered = store.create();
        remembered.remember_me = true;
        store.save(&mut remembered).unwrap();

        assert_eq!(store.purge_expired().unwrap(), 0);
        // Nothing is stale yet, so look two days ahead directly.
        assert_eq!(
            store
                .kv
                .purge_expired((Utc::now() + Duration::days(2)).timestamp())
                .unwrap(),
            1
        );
        assert!(store.load(&remembered.id).unwrap().is_some());
        assert!(store.load(&live.id).unwrap().is_none());
    }

    #[test]
    fn unreadable_record_is_dropped() {
        let store = store();
        store
            .kv
            .put("session:garbage", b"not json", i64::MAX)
            .unwrap();
        assert!(store.load("garbage").unwrap().is_none());
        assert!(store.kv.get("session:garbage", 0).unwrap().is_none());
    }

    #[test]
    fn cookies() {
        let config = SessionConfig {
            secure_cookie: true,
            ..Default::default()
        };
        let mut s = Session::new(Utc::now());
        s.id = "abc".into();
        assert_eq!(
            config.cookie_for(&s),
            "sessionid=abc; Path=/; HttpOnly; SameSite=Lax; Secure"
        );
        s.remember_me = true;
        assert!(config.cookie_for(&s).contains("Max-Age=604800"));
        assert!(config.clear_cookie().contains("Max-Age=0"));
    }
}
