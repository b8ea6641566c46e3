use std::path::Path;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::error::KVError;
use crate::traits::KVStore;

/// key -> (expires_at, value)
const ENTRIES: TableDefinition<&str, (i64, &[u8])> = TableDefinition::new("entries");

/// KVStore on a redb database file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Open(e.to_string()))?;
        debug!("opened kv database at {}", path.display());
        Self::with_table(db)
    }

    /// A database that lives only in memory.
    pub fn open_in_memory() -> Result<Self, KVError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(|e| KVError::Open(e.to_string()))?;
        Self::with_table(db)
    }

    // Readers open the table in read transactions, which fails until a
    // write transaction has created it.
    fn with_table(db: Database) -> Result<Self, KVError> {
        let txn = db.begin_write()?;
        txn.open_table(ENTRIES)?;
        txn.commit()?;
        Ok(Self { db })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str, now: i64) -> Result<Option<Vec<u8>>, KVError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTRIES)?;
        let Some(guard) = table.get(key)? else {
            return Ok(None);
        };
        let (expires_at, value) = guard.value();
        if expires_at <= now {
            return Ok(None);
        }
        Ok(Some(value.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8], expires_at: i64) -> Result<(), KVError> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENTRIES)?;
            table.insert(key, (expires_at, value))?;
        }
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, KVError> {
        let txn = self.db.begin_write()?;
        let existed = {
            let mut table = txn.open_table(ENTRIES)?;
            let removed = table.remove(key)?;
            removed.is_some()
        };
        txn.commit()?;
        Ok(existed)
    }

    fn purge_expired(&self, now: i64) -> Result<usize, KVError> {
        let txn = self.db.begin_write()?;
        let purged = {
            let mut table = txn.open_table(ENTRIES)?;
            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                if value.value().0 <= now {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        txn.commit()?;
        if purged > 0 {
            debug!(purged, "purged expired kv entries");
        }
        Ok(purged)
    }
}
