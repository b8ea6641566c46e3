pub mod schema;
pub mod identity;
pub mod course;
pub mod enrollment;
pub mod messaging;
pub mod notification;
pub mod newsletter;
pub mod dashboard;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use eduforall_core::ServiceError;
use eduforall_kv::KVError;
use eduforall_sql::{SQLError, SQLStore, Statement, Value};

use crate::mail::Mailer;
use crate::model::Role;

/// Workflow error type. Every variant except `Storage` and `Internal` is an
/// expected outcome carrying a message fit for the end user.
#[derive(Debug, Error)]
pub enum SchoolError {
    #[error("{0}")]
    Validation(String),

    #[error("A {0} with this email already exists")]
    DuplicateEmail(Role),

    #[error("You are already subscribed to our newsletter")]
    AlreadySubscribed,

    #[error("You are already enrolled in this course")]
    AlreadyEnrolled,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid enrollment type")]
    InvalidEnrollmentType,

    #[error("Mentor not found")]
    MentorNotFound,

    #[error("Message cannot be empty")]
    EmptyBody,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<SQLError> for SchoolError {
    fn from(e: SQLError) -> Self {
        SchoolError::Storage(e.to_string())
    }
}

impl From<KVError> for SchoolError {
    fn from(e: KVError) -> Self {
        SchoolError::Storage(e.to_string())
    }
}

impl From<SchoolError> for ServiceError {
    fn from(e: SchoolError) -> Self {
        let msg = e.to_string();
        match e {
            SchoolError::Validation(_) | SchoolError::EmptyBody | SchoolError::InvalidEmail => {
                ServiceError::Validation(msg)
            }
            SchoolError::DuplicateEmail(_)
            | SchoolError::AlreadySubscribed
            | SchoolError::AlreadyEnrolled => ServiceError::Conflict(msg),
            SchoolError::InvalidCredentials | SchoolError::Unauthenticated(_) => {
                ServiceError::Unauthorized(msg)
            }
            SchoolError::NotFound(_) => ServiceError::NotFound(msg),
            SchoolError::InvalidEnrollmentType | SchoolError::MentorNotFound => {
                ServiceError::Rule(msg)
            }
            SchoolError::Forbidden(_) => ServiceError::PermissionDenied(msg),
            SchoolError::Storage(m) => ServiceError::Storage(m),
            SchoolError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// The school service. Holds the relational store and the mail transport.
pub struct SchoolService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) mailer: Arc<dyn Mailer>,
}

impl SchoolService {
    /// Create a new SchoolService, initializing the DB schema.
    pub fn new(sql: Arc<dyn SQLStore>, mailer: Arc<dyn Mailer>) -> Result<Arc<Self>, SchoolError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Arc::new(Self { sql, mailer }))
    }

    // ── Generic record helpers ──
    //
    // Each table stores the full record as JSON in `data`, plus the columns
    // that need indexes, constraints or foreign keys.

    /// Build an INSERT of a JSON record with its indexed columns.
    pub(crate) fn insert_statement<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<Statement, SchoolError> {
        let json = serde_json::to_string(record)
            .map_err(|e| SchoolError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            cols.push(col);
            placeholders.push(format!("?{}", i + 3));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );
        Ok(Statement::new(sql, params))
    }

    /// Build an UPDATE of a record's JSON data and indexed columns.
    pub(crate) fn update_statement<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<Statement, SchoolError> {
        Self::update_statement_where(table, id, record, indexes, None)
    }

    /// Like `update_statement`, with an extra SQL predicate ANDed to the id
    /// match. The predicate takes no parameters.
    pub(crate) fn update_statement_where<T: Serialize>(
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
        predicate: Option<&str>,
    ) -> Result<Statement, SchoolError> {
        let json = serde_json::to_string(record)
            .map_err(|e| SchoolError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            sets.push(format!("{} = ?{}", col, i + 2));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let mut sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table,
            sets.join(", "),
            id_idx,
        );
        if let Some(p) = predicate {
            sql.push_str(" AND (");
            sql.push_str(p);
            sql.push(')');
        }
        Ok(Statement::new(sql, params))
    }

    pub(crate) fn run(&self, stmt: &Statement) -> Result<u64, SQLError> {
        self.sql.exec(&stmt.sql, &stmt.params)
    }

    /// Fetch one record whose column equals the value.
    pub(crate) fn find_record<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Option<T>, SchoolError> {
        let sql = format!("SELECT data FROM {} WHERE {} = ?1", table, column);
        let mut items = self.query_records(&sql, &[Value::Text(value.to_string())])?;
        Ok(if items.is_empty() {
            None
        } else {
            Some(items.swap_remove(0))
        })
    }

    /// Fetch a record by id.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, SchoolError> {
        self.find_record(table, "id", id)
    }

    /// Run a query selecting a `data` column and decode every row.
    pub(crate) fn query_records<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>, SchoolError> {
        let rows = self.sql.query(sql, params)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let data = row
                .get_str("data")
                .ok_or_else(|| SchoolError::Internal("missing data column".into()))?;
            let item: T =
                serde_json::from_str(data).map_err(|e| SchoolError::Internal(e.to_string()))?;
            items.push(item);
        }
        Ok(items)
    }

    /// Run a query returning a single `cnt` column.
    pub(crate) fn count(&self, sql: &str, params: &[Value]) -> Result<usize, SchoolError> {
        Ok(self
            .sql
            .query(sql, params)?
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize)
    }

    /// List records with equality filters and pagination, newest first.
    pub(crate) fn list_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<T>, usize), SchoolError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            where_clauses.push(format!("{} = ?{}", col, i + 1));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) AS cnt FROM {}{}", table, where_sql);
        let total = self.count(&count_sql, &params)?;

        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY created_at DESC, id LIMIT ?{} OFFSET ?{}",
            table, where_sql, limit_idx, offset_idx,
        );
        let items = self.query_records(&sql, &params)?;

        Ok((items, total))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use eduforall_sql::SqliteStore;

    use super::*;
    use crate::mail::testing::RecordingMailer;
    use crate::model::{Account, Course, CreateCourse, Mentor, RegisterInput, Session, Student};

    pub fn service() -> Arc<SchoolService> {
        service_with_mailer(Arc::new(RecordingMailer::default()))
    }

    pub fn service_with_mailer(mailer: Arc<dyn Mailer>) -> Arc<SchoolService> {
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        SchoolService::new(sql, mailer).unwrap()
    }

    pub fn session() -> Session {
        Session::new(chrono::Utc::now() + chrono::Duration::days(1))
    }

    pub fn register_form(role: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            phone_number: "555-0100".into(),
            password: password.into(),
            confirm_password: password.into(),
            role: role.into(),
            expertise: Some("Mathematics".into()),
            bio: None,
        }
    }

    /// Register an account in a throwaway session.
    pub fn register(svc: &SchoolService, role: &str, email: &str) -> Account {
        svc.register(&mut session(), register_form(role, email, "pw123456"))
            .unwrap()
    }

    pub fn student(svc: &SchoolService, email: &str) -> Student {
        match register(svc, "student", email) {
            Account::Student(s) => s,
            Account::Mentor(_) => unreachable!(),
        }
    }

    pub fn mentor(svc: &SchoolService, email: &str) -> Mentor {
        match register(svc, "mentor", email) {
            Account::Mentor(m) => m,
            Account::Student(_) => unreachable!(),
        }
    }

    pub fn course_form(title: &str) -> CreateCourse {
        CreateCourse {
            title: title.into(),
            description: "An introduction".into(),
            start_date: "2026-01-05".into(),
            end_date: "2026-03-01".into(),
            ..Default::default()
        }
    }

    pub fn course(svc: &SchoolService, owner: &Mentor, title: &str) -> Course {
        svc.create_course(owner, course_form(title)).unwrap()
    }
}
