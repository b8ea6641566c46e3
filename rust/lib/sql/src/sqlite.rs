use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode};

use crate::error::SQLError;
use crate::traits::{Row, SQLStore, Statement, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for concurrent reads; foreign keys are off by default in SQLite.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        tracing::debug!("opened sqlite database at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

/// Classify a write failure, separating constraint violations from the rest.
fn exec_error(e: rusqlite::Error) -> SQLError {
    if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
        if err.code == ErrorCode::ConstraintViolation {
            let text = msg.clone().unwrap_or_else(|| e.to_string());
            return match err.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => SQLError::Unique(text),
                _ => SQLError::Constraint(text),
            };
        }
    }
    SQLError::Execution(e.to_string())
}

impl SQLStore for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let mut columns = Vec::with_capacity(column_names.len());
                for (i, name) in column_names.iter().enumerate() {
                    columns.push((name.clone(), row_value_at(row, i)?));
                }
                Ok(Row { columns })
            })
            .map_err(|e| SQLError::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
        }
        Ok(result)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let bound = bind_params(params);
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            bound.iter().map(|b| b.as_ref()).collect();

        let affected = conn
            .execute(sql, param_refs.as_slice())
            .map_err(exec_error)?;

        Ok(affected as u64)
    }

    fn exec_batch(&self, statements: &[Statement]) -> Result<Vec<u64>, SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let mut counts = Vec::with_capacity(statements.len());
        for stmt in statements {
            let bound = bind_params(&stmt.params);
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                bound.iter().map(|b| b.as_ref()).collect();
            // Returning early drops `tx`, which rolls the whole batch back.
            let affected = tx
                .execute(&stmt.sql, param_refs.as_slice())
                .map_err(exec_error)?;
            if stmt.must_change && affected == 0 {
                return Err(SQLError::Unchanged(stmt.sql.clone()));
            }
            counts.push(affected as u64);
        }

        tx.commit()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        Ok(counts)
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE parents (id TEXT PRIMARY KEY, email TEXT NOT NULL UNIQUE)",
                &[],
            )
            .unwrap();
        store
            .exec(
                "CREATE TABLE children (
                    id TEXT PRIMARY KEY,
                    parent_id TEXT NOT NULL REFERENCES parents(id) ON DELETE CASCADE,
                    score REAL
                )",
                &[],
            )
            .unwrap();
        store
    }

    #[test]
    fn query_returns_typed_columns() {
        let s = store();
        s.exec(
            "INSERT INTO parents (id, email) VALUES (?1, ?2)",
            &[Value::Text("p1".into()), Value::Text("a@x.com".into())],
        )
        .unwrap();
        s.exec(
            "INSERT INTO children (id, parent_id, score) VALUES (?1, ?2, ?3)",
            &[
                Value::Text("c1".into()),
                Value::Text("p1".into()),
                Value::Real(2.5),
            ],
        )
        .unwrap();

        let rows = s
            .query("SELECT id, score, NULL AS nothing, 7 AS n FROM children", &[])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("id"), Some("c1"));
        assert_eq!(rows[0].get_f64("score"), Some(2.5));
        assert_eq!(rows[0].get("nothing"), Some(&Value::Null));
        assert_eq!(rows[0].get_i64("n"), Some(7));
    }

    #[test]
    fn unique_violation_is_classified() {
        let s = store();
        let params = [Value::Text("p1".into()), Value::Text("a@x.com".into())];
        s.exec("INSERT INTO parents (id, email) VALUES (?1, ?2)", &params)
            .unwrap();
        let err = s
            .exec(
                "INSERT INTO parents (id, email) VALUES (?1, ?2)",
                &[Value::Text("p2".into()), Value::Text("a@x.com".into())],
            )
            .unwrap_err();
        assert!(err.is_unique_violation(), "got {err:?}");
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let s = store();
        let err = s
            .exec(
                "INSERT INTO children (id, parent_id) VALUES (?1, ?2)",
                &[Value::Text("c1".into()), Value::Text("missing".into())],
            )
            .unwrap_err();
        assert!(matches!(err, SQLError::Constraint(_)), "got {err:?}");
    }

    #[test]
    fn batch_rolls_back_on_failure() {
        let s = store();
        let err = s
            .exec_batch(&[
                Statement::new(
                    "INSERT INTO parents (id, email) VALUES (?1, ?2)",
                    vec![Value::Text("p1".into()), Value::Text("a@x.com".into())],
                ),
                Statement::new(
                    "INSERT INTO parents (id, email) VALUES (?1, ?2)",
                    vec![Value::Text("p2".into()), Value::Text("a@x.com".into())],
                ),
            ])
            .unwrap_err();
        assert!(err.is_unique_violation());

        let rows = s.query("SELECT COUNT(*) AS cnt FROM parents", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn batch_commits_all() {
        let s = store();
        let counts = s
            .exec_batch(&[
                Statement::new(
                    "INSERT INTO parents (id, email) VALUES (?1, ?2)",
                    vec![Value::Text("p1".into()), Value::Text("a@x.com".into())],
                ),
                Statement::new(
                    "INSERT INTO children (id, parent_id) VALUES (?1, ?2)",
                    vec![Value::Text("c1".into()), Value::Text("p1".into())],
                ),
            ])
            .unwrap();
        assert_eq!(counts, vec![1, 1]);

        // Cascade removes the child with its parent.
        s.exec("DELETE FROM parents WHERE id = ?1", &[Value::Text("p1".into())])
            .unwrap();
        let rows = s.query("SELECT COUNT(*) AS cnt FROM children", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn unmatched_guard_rolls_back_batch() {
        let s = store();
        s.exec(
            "INSERT INTO parents (id, email) VALUES (?1, ?2)",
            &[Value::Text("p1".into()), Value::Text("a@x.com".into())],
        )
        .unwrap();

        let err = s
            .exec_batch(&[
                Statement::new(
                    "INSERT INTO children (id, parent_id) VALUES (?1, ?2)",
                    vec![Value::Text("c1".into()), Value::Text("p1".into())],
                ),
                Statement::new(
                    "UPDATE parents SET email = ?1 WHERE id = ?2 AND email = ?3",
                    vec![
                        Value::Text("b@x.com".into()),
                        Value::Text("p1".into()),
                        Value::Text("stale@x.com".into()),
                    ],
                )
                .must_change(),
            ])
            .unwrap_err();
        assert!(matches!(err, SQLError::Unchanged(_)), "got {err:?}");

        let rows = s.query("SELECT COUNT(*) AS cnt FROM children", &[]).unwrap();
        assert_eq!(rows[0].get_i64("cnt"), Some(0));

        // An unguarded statement matching nothing is fine.
        let counts = s
            .exec_batch(&[Statement::new(
                "UPDATE parents SET email = ?1 WHERE id = ?2",
                vec![Value::Text("b@x.com".into()), Value::Text("missing".into())],
            )])
            .unwrap();
        assert_eq!(counts, vec![0]);
    }
}
