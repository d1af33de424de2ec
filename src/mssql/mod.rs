//! SQL Server collaborator.
//!
//! The check only needs to open a connection, run one statement at a time
//! and read rows back. [`Connector`] and [`Connection`] are that seam;
//! [`SqlServerConnector`] implements it over TDS.

mod catalog;
mod client;
mod discovery;
#[cfg(test)]
pub(crate) mod fake;

pub use catalog::*;
pub use client::*;
pub use discovery::*;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Database error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("query error: {0}")]
    Query(String),
}

/// A single cell read back from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell. Text is accepted when it parses as a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
        }
    }
}

pub type Row = Vec<Value>;

/// An open connection to one database.
#[async_trait]
pub trait Connection: Send {
    /// Run `sql` and return every row of its first result set.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError>;

    /// Close the connection. Dropping a connection also releases it.
    async fn close(self: Box<Self>) -> Result<(), DbError>;
}

/// Opens connections to a server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Server identity including any instance or port suffix.
    fn host(&self) -> &str;

    /// Connect, optionally selecting `database` as the initial catalog.
    async fn connect(&self, database: Option<&str>) -> Result<Box<dyn Connection>, DbError>;
}
