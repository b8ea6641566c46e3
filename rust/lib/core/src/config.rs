use std::path::PathBuf;

/// Storage locations shared by the server and its modules.
///
/// Built by the binary from its config file, then handed to storage
/// initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory for all persistent files.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Path to the redb file backing the session store.
    /// Defaults to `{data_dir}/sessions.redb` if not specified.
    pub session_db_path: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            session_db_path: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    /// Resolve the session database path, falling back to `{data_dir}/sessions.redb`.
    pub fn resolve_session_db_path(&self) -> PathBuf {
        self.session_db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("sessions.redb"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
