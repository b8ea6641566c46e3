use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("unique constraint violated: {0}")]
    Unique(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("statement changed no rows: {0}")]
    Unchanged(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    /// True if the statement was rejected by a UNIQUE or PRIMARY KEY constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SQLError::Unique(_))
    }
}
