use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Largest page a list endpoint will return.
pub const MAX_PAGE_SIZE: usize = 200;

/// `?limit=&offset=` query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ListParams {
    /// Limit clamped to `1..=MAX_PAGE_SIZE`.
    pub fn page_size(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

/// One page of a list plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Random record id: UUIDv4 as 32 hex characters.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Current UTC time, RFC 3339 with fixed nanosecond precision and a `Z`
/// suffix, so stored timestamps sort correctly as text.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
