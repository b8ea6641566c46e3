//! Server configuration file.
//!
//! A context name resolves to `/etc/eduforall/<name>.toml`; anything that
//! looks like a path is used as is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use school::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `data.sqlite` and `sessions.redb`.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub cookie_name: String,
    pub idle_timeout_secs: i64,
    pub session_ttl_secs: i64,
    pub remember_me_ttl_secs: i64,
    pub secure_cookie: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        let d = SessionConfig::default();
        Self {
            cookie_name: d.cookie_name,
            idle_timeout_secs: d.idle_timeout_secs,
            session_ttl_secs: d.session_ttl_secs,
            remember_me_ttl_secs: d.remember_me_ttl_secs,
            secure_cookie: d.secure_cookie,
        }
    }
}

impl From<&SessionSection> for SessionConfig {
    fn from(s: &SessionSection) -> Self {
        SessionConfig {
            cookie_name: s.cookie_name.clone(),
            idle_timeout_secs: s.idle_timeout_secs,
            session_ttl_secs: s.session_ttl_secs,
            remember_me_ttl_secs: s.remember_me_ttl_secs,
            secure_cookie: s.secure_cookie,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    /// When false, outbound mail is dropped.
    pub enabled: bool,
    pub from_address: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            enabled: true,
            from_address: "noreply@eduforall.local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub mail: MailSection,
}

impl ServerConfig {
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from("/etc/eduforall").join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
