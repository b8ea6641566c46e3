use crate::error::KVError;

/// Byte values with an absolute expiry, keyed by string.
///
/// Expiry is a unix timestamp in seconds. An entry whose expiry is at or
/// before `now` reads as absent; it stays on disk until `purge_expired`.
pub trait KVStore: Send + Sync {
    /// Live value for a key.
    fn get(&self, key: &str, now: i64) -> Result<Option<Vec<u8>>, KVError>;

    /// Insert or replace a value together with its expiry.
    fn put(&self, key: &str, value: &[u8], expires_at: i64) -> Result<(), KVError>;

    /// Remove a key. Returns false if it was not there.
    fn delete(&self, key: &str) -> Result<bool, KVError>;

    /// Remove every entry expired at `now`, in one transaction.
    fn purge_expired(&self, now: i64) -> Result<usize, KVError>;
}
