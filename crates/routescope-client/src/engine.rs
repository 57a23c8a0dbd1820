//! Query engine abstraction.
//!
//! The execution service talks to storage through [`QueryEngine`]: one
//! connection per call, one query per connection, always closed.

use async_trait::async_trait;
use routescope_core::predicate::quote_ident;
use routescope_core::{Predicate, Row};

use crate::error::Error;

/// A projection-and-filter request against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineQuery {
    /// Table or view to read.
    pub table: String,
    /// Identifier column, always projected.
    pub id_field: String,
    /// Geometry column projected for post-filtering.
    pub geometry_field: Option<String>,
    /// Further columns projected for post-filtering.
    pub extra_columns: Vec<String>,
    /// Row filter.
    pub predicate: Predicate,
}

impl EngineQuery {
    pub fn new(table: impl Into<String>, id_field: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            table: table.into(),
            id_field: id_field.into(),
            geometry_field: None,
            extra_columns: Vec::new(),
            predicate,
        }
    }

    /// Also project a geometry column.
    pub fn with_geometry_field(mut self, field: impl Into<String>) -> Self {
        self.geometry_field = Some(field.into());
        self
    }

    /// Also project these columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Projected column names, id first, without repeats.
    pub fn columns(&self) -> Vec<&str> {
        let mut cols = vec![self.id_field.as_str()];
        for c in self.geometry_field.iter().chain(&self.extra_columns) {
            if !cols.contains(&c.as_str()) {
                cols.push(c.as_str());
            }
        }
        cols
    }

    /// Render as a SQL `SELECT DISTINCT` statement.
    pub fn to_sql(&self) -> String {
        let projection = self
            .columns()
            .into_iter()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT DISTINCT {} FROM {} WHERE {}",
            projection,
            quote_ident(&self.table),
            self.predicate.to_sql()
        )
    }
}

/// A source of engine connections.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Open a connection.
    async fn connect(&self) -> Result<Box<dyn EngineConnection>, Error>;
}

/// A live engine connection.
#[async_trait]
pub trait EngineConnection: Send {
    /// Run a query and return every matching row.
    async fn query(&mut self, query: &EngineQuery) -> Result<Vec<Row>, Error>;

    /// Release the connection.
    async fn close(&mut self) -> Result<(), Error>;
}
