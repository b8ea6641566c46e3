use thiserror::Error;

#[derive(Error, Debug)]
pub enum KVError {
    #[error("cannot open kv database: {0}")]
    Open(String),

    #[error("kv transaction failed: {0}")]
    Transaction(String),

    #[error("kv storage error: {0}")]
    Storage(String),
}

impl From<redb::TransactionError> for KVError {
    fn from(e: redb::TransactionError) -> Self {
        KVError::Transaction(e.to_string())
    }
}

impl From<redb::CommitError> for KVError {
    fn from(e: redb::CommitError) -> Self {
        KVError::Transaction(e.to_string())
    }
}

impl From<redb::TableError> for KVError {
    fn from(e: redb::TableError) -> Self {
        KVError::Storage(e.to_string())
    }
}

impl From<redb::StorageError> for KVError {
    fn from(e: redb::StorageError) -> Self {
        KVError::Storage(e.to_string())
    }
}
