use axum::Router;

use crate::ServiceError;

/// A service module mounted by the server binary.
pub trait Module: Send + Sync {
    /// Module name, used for logging.
    fn name(&self) -> &str;

    /// Routes merged at the server root.
    fn routes(&self) -> Router;

    /// Housekeeping run once before the server starts listening.
    fn on_start(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
