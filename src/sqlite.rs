//! SQLite connection
//!
//! Runs compiled statements through `rusqlite`, translating between
//! [`Value`] and SQLite's storage classes. Booleans are stored as integers
//! and timestamps as RFC 3339 text.

use chrono::SecondsFormat;
use relsql_core::{CompiledStatement, Dialect, SqlError, SqliteDialect, Value};
use rusqlite::types::{Value as SqliteValue, ValueRef};
use rusqlite::{params_from_iter, ErrorCode};
use std::path::Path;
use std::time::Duration;

use crate::connection::{Connection, Row};
use crate::error::{PersistError, PersistResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection to a SQLite database file or an in-memory database
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    dialect: SqliteDialect,
}

impl SqliteConnection {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> PersistResult<Self> {
        let conn = rusqlite::Connection::open(path.as_ref())
            .map_err(|e| driver_error(e, "<open>"))?;
        // other connections on the same file may hold the write lock briefly
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| driver_error(e, "<open>"))?;
        tracing::debug!("[SQLITE] Opened {}", path.as_ref().display());
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(|e| driver_error(e, "<open>"))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self {
            conn,
            dialect: SqliteDialect,
        }
    }

    /// Run raw SQL, e.g. schema setup
    pub fn execute_batch(&self, sql: &str) -> PersistResult<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| driver_error(e, sql))
    }

    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn bind(statement: &CompiledStatement) -> PersistResult<Vec<SqliteValue>> {
        statement
            .params()
            .into_iter()
            .map(to_sqlite)
            .collect()
    }
}

fn to_sqlite(value: Value) -> PersistResult<SqliteValue> {
    Ok(match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(b as i64),
        Value::Integer(i) => SqliteValue::Integer(i),
        Value::Real(f) => SqliteValue::Real(f),
        Value::Text(s) => SqliteValue::Text(s),
        Value::Blob(b) => SqliteValue::Blob(b),
        Value::Timestamp(t) => SqliteValue::Text(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Value::Array(_) => {
            return Err(PersistError::Sql(SqlError::Unsupported {
                dialect: "sqlite",
                what: "array binding".to_string(),
            }))
        }
    })
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn driver_error(err: rusqlite::Error, sql: &str) -> PersistError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            PersistError::ConstraintViolation {
                message: message.clone().unwrap_or_else(|| err.to_string()),
                sql: sql.to_string(),
            }
        }
        _ => PersistError::Driver {
            message: err.to_string(),
            sql: sql.to_string(),
        },
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn query(&mut self, statement: &CompiledStatement) -> PersistResult<Vec<Row>> {
        tracing::debug!("[SQL] {} {:?}", statement.sql, statement.params());
        let params = Self::bind(statement)?;
        let sql = statement.sql.as_str();

        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| driver_error(e, sql))?;
        let columns = stmt.column_count();
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| driver_error(e, sql))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| driver_error(e, sql))? {
            let mut values = Vec::with_capacity(columns);
            for i in 0..columns {
                let value = row.get_ref(i).map_err(|e| driver_error(e, sql))?;
                values.push(from_sqlite(value));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn execute(&mut self, statement: &CompiledStatement) -> PersistResult<u64> {
        tracing::debug!("[SQL] {} {:?}", statement.sql, statement.params());
        let params = Self::bind(statement)?;
        let sql = statement.sql.as_str();

        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| driver_error(e, sql))?;
        let affected = stmt
            .execute(params_from_iter(params))
            .map_err(|e| driver_error(e, sql))?;
        Ok(affected as u64)
    }

    fn last_generated_key(&mut self) -> PersistResult<Option<Value>> {
        let rowid = self.conn.last_insert_rowid();
        Ok((rowid != 0).then_some(Value::Integer(rowid)))
    }
}
