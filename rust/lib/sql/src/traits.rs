use crate::error::SQLError;

/// A dynamically-typed SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Text value, or NULL when absent.
    pub fn opt_text(v: Option<&str>) -> Self {
        match v {
            Some(s) => Value::Text(s.to_string()),
            None => Value::Null,
        }
    }

    pub fn bool(b: bool) -> Self {
        Value::Integer(if b { 1 } else { 0 })
    }
}

/// A row returned from a SQL query: column name to value.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    /// Get a column value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Get a text column value by name.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer column value by name.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a real column value by name.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name) {
            Some(Value::Real(f)) => Some(*f),
            Some(Value::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }
}

/// One statement of an atomic batch.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Abort the batch with `SQLError::Unchanged` if no row is affected.
    pub must_change: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            must_change: false,
        }
    }

    /// Require this statement to affect at least one row. A guarded UPDATE
    /// whose WHERE no longer matches then rolls the whole batch back.
    pub fn must_change(mut self) -> Self {
        self.must_change = true;
        self
    }
}

/// SQLStore provides a SQL execution interface backed by an embedded database.
pub trait SQLStore: Send + Sync {
    /// Execute a query and return rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError>;

    /// Execute a statement (INSERT/UPDATE/DELETE) and return affected row count.
    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError>;

    /// Execute all statements in one transaction. Either every statement
    /// commits or none does. Returns the affected row count of each.
    fn exec_batch(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError>;
}
