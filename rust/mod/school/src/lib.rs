//! School module: accounts, courses, enrollments, messaging and newsletter.
//!
//! # Resources
//!
//! - **Student / Mentor**: accounts in separate tables, one role each
//! - **Course**: owned by an instructor record derived from the authoring mentor
//! - **Enrollment**: one per student and course, with a learning path
//! - **Message / Notification**: per-enrollment conversation and inbox
//! - **Newsletter**: email subscriptions, deactivated rather than deleted
//!
//! Sessions are cookie-identified records in the KV store. Every request
//! passes through the idle-timeout middleware.
//!
//! # Usage
//!
//! ```ignore
//! use school::{SchoolModule, SessionConfig};
//!
//! let module = SchoolModule::new(sql, kv, mailer, SessionConfig::default())?;
//! let router = module.routes();
//! ```

pub mod api;
pub mod mail;
pub mod model;
pub mod password;
pub mod service;
pub mod sessions;
pub mod validate;

use std::sync::Arc;

use axum::Router;

use eduforall_core::{Module, ServiceError};
use eduforall_kv::KVStore;
use eduforall_sql::SQLStore;

pub use crate::service::{SchoolError, SchoolService};
pub use crate::sessions::{SessionConfig, SessionStore};

/// School module implementing the Module trait.
pub struct SchoolModule {
    service: Arc<SchoolService>,
    sessions: Arc<SessionStore>,
}

impl SchoolModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        mailer: Arc<dyn mail::Mailer>,
        config: SessionConfig,
    ) -> Result<Self, ServiceError> {
        let service = SchoolService::new(sql, mailer).map_err(ServiceError::from)?;
        let sessions = Arc::new(SessionStore::new(kv, config));
        Ok(Self { service, sessions })
    }

    pub fn service(&self) -> &Arc<SchoolService> {
        &self.service
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }
}

impl Module for SchoolModule {
    fn name(&self) -> &str {
        "school"
    }

    fn routes(&self) -> Router {
        api::build_router(api::AppState {
            svc: self.service.clone(),
            sessions: self.sessions.clone(),
        })
    }

    fn on_start(&self) -> Result<(), ServiceError> {
        let purged = self.sessions.purge_expired().map_err(ServiceError::from)?;
        tracing::info!("Purged {} expired sessions", purged);
        Ok(())
    }
}
