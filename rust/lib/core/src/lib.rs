//! Shared plumbing for EduForAll crates: HTTP error type, storage paths,
//! the module trait and small helpers.

pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use module::Module;
pub use types::{ListParams, ListResult, MAX_PAGE_SIZE, new_id, now_rfc3339};
