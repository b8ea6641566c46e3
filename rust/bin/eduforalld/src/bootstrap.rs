//! First-start checks.

use crate::config::ServerConfig;

/// Refuse to start on a configuration that cannot work.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.storage.data_dir.trim().is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    let session = &config.session;
    if session.cookie_name.trim().is_empty() {
        anyhow::bail!("Session cookie_name is empty in configuration.");
    }
    for (name, value) in [
        ("idle_timeout_secs", session.idle_timeout_secs),
        ("session_ttl_secs", session.session_ttl_secs),
        ("remember_me_ttl_secs", session.remember_me_ttl_secs),
    ] {
        if value <= 0 {
            anyhow::bail!("Session {} must be positive, got {}.", name, value);
        }
    }
    if config.mail.enabled && config.mail.from_address.trim().is_empty() {
        anyhow::bail!("Mail is enabled but from_address is empty.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MailSection, SessionSection, StorageConfig};

    fn config() -> ServerConfig {
        ServerConfig {
            storage: StorageConfig {
                data_dir: "/var/lib/eduforall".into(),
            },
            session: SessionSection::default(),
            mail: MailSection::default(),
        }
    }

    #[test]
    fn test_verify_config_ok() {
        assert!(verify_config(&config()).is_ok());
    }

    #[test]
    fn test_verify_config_empty_data_dir() {
        let mut c = config();
        c.storage.data_dir = " ".into();
        let err = verify_config(&c).unwrap_err();
        assert!(err.to_string().contains("data_dir"));
    }

    #[test]
    fn test_verify_config_zero_timeout() {
        let mut c = config();
        c.session.idle_timeout_secs = 0;
        let err = verify_config(&c).unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));
    }

    #[test]
    fn test_verify_config_empty_cookie_name() {
        let mut c = config();
        c.session.cookie_name = String::new();
        assert!(verify_config(&c).is_err());
    }

    #[test]
    fn test_verify_config_mail_sender() {
        let mut c = config();
        c.mail.from_address = String::new();
        assert!(verify_config(&c).is_err());
        c.mail.enabled = false;
        assert!(verify_config(&c).is_ok());
    }
}
