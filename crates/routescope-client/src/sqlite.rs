//! SQLite query engine.
//!
//! Runs the rendered `SELECT DISTINCT` statement on a shared connection.
//! SQLite has no spatial functions, so this engine serves bbox-tier
//! datasets and attribute filters.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use routescope_core::Row;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use crate::engine::{EngineConnection, EngineQuery, QueryEngine};
use crate::error::Error;

/// Engine backed by one SQLite database.
pub struct SqliteEngine {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEngine {
    /// Open a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(backend)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run setup statements such as schema and seed data.
    pub fn execute_batch(&self, sql: &str) -> Result<(), Error> {
        self.conn.lock().execute_batch(sql).map_err(backend)
    }
}

#[async_trait]
impl QueryEngine for SqliteEngine {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>, Error> {
        Ok(Box::new(SqliteConnection {
            conn: Some(Arc::clone(&self.conn)),
        }))
    }
}

/// Connection handle to a [`SqliteEngine`].
pub struct SqliteConnection {
    conn: Option<Arc<Mutex<Connection>>>,
}

#[async_trait]
impl EngineConnection for SqliteConnection {
    async fn query(&mut self, query: &EngineQuery) -> Result<Vec<Row>, Error> {
        let conn = self
            .conn
            .clone()
            .ok_or_else(|| Error::Backend("connection is closed".into()))?;
        let sql = query.to_sql();
        tracing::debug!(sql = %sql, "executing sqlite query");

        tokio::task::spawn_blocking(move || run_query(&conn.lock(), &sql))
            .await
            .map_err(|e| Error::Backend(format!("sqlite worker failed: {}", e)))?
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.conn = None;
        Ok(())
    }
}

fn run_query(conn: &Connection, sql: &str) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(sql).map_err(backend)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([]).map_err(backend)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(backend)? {
        let mut map = Row::new();
        for (i, name) in names.iter().enumerate() {
            let value = row.get_ref(i).map_err(backend)?;
            map.insert(name.clone(), to_json(value));
        }
        out.push(map);
    }
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

fn backend(e: rusqlite::Error) -> Error {
    Error::Backend(e.to_string())
}
