use serde::Serialize;

/// A newsletter subscription. Unsubscribing clears `active`; rows are never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Newsletter {
    pub id: String,
    pub email: String,
    pub active: bool,
    pub subscribed_at: String,
    pub updated_at: String,
}

/// Result of a successful subscribe.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeOutcome {
    pub subscription: Newsletter,
    /// True when an inactive record was switched back on.
    pub reactivated: bool,
}
