//! Scripted in-memory server for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Connection, Connector, DbError, Row};

/// Answers queries from a fixed script and counts connection lifetimes.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    host: String,
    responses: Arc<HashMap<String, Vec<Row>>>,
    unreachable: Arc<HashSet<String>>,
    slow: Arc<HashMap<String, Duration>>,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Default::default()
        }
    }

    pub fn respond(mut self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        Arc::make_mut(&mut self.responses).insert(sql.into(), rows);
        self
    }

    /// Connecting to `database` fails.
    pub fn unreachable(mut self, database: &str) -> Self {
        Arc::make_mut(&mut self.unreachable).insert(database.to_string());
        self
    }

    /// `sql` takes `delay` to answer.
    pub fn slow(mut self, sql: impl Into<String>, delay: Duration) -> Self {
        Arc::make_mut(&mut self.slow).insert(sql.into(), delay);
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn host(&self) -> &str {
        &self.host
    }

    async fn connect(&self, database: Option<&str>) -> Result<Box<dyn Connection>, DbError> {
        if let Some(db) = database {
            if self.unreachable.contains(db) {
                return Err(DbError::Connection(format!("login failed for database {}", db)));
            }
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            responses: self.responses.clone(),
            slow: self.slow.clone(),
            released: self.released.clone(),
        }))
    }
}

struct FakeConnection {
    responses: Arc<HashMap<String, Vec<Row>>>,
    slow: Arc<HashMap<String, Duration>>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        if let Some(delay) = self.slow.get(sql) {
            tokio::time::sleep(*delay).await;
        }
        self.responses
            .get(sql)
            .cloned()
            .ok_or_else(|| DbError::Query(format!("unexpected query: {}", sql)))
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
