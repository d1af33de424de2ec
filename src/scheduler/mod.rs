//! Scheduler module for checking many databases in one run.

mod aggregate;

pub use aggregate::*;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::config::ProbeConfig;
use crate::db::CounterStore;
use crate::mssql::{Connection, Connector, QuerySpec};
use crate::probe::{run_probe, ProbeContext, ProbeError};
use crate::threshold::{classify, EvaluationResult, Thresholds};

/// What happened to one database in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    Evaluated(EvaluationResult),
    Failed(String),
}

/// Run `spec` on an open connection and classify the result.
pub async fn evaluate(
    conn: &mut dyn Connection,
    host: &str,
    store: &CounterStore,
    database: &str,
    spec: &QuerySpec,
    thresholds: &Thresholds,
) -> Result<EvaluationResult, ProbeError> {
    let ctx = ProbeContext {
        host,
        database,
        store,
        now: Utc::now(),
    };
    let value = run_probe(conn, spec, &ctx).await?;
    Ok(classify(value, thresholds, &spec.label, &spec.unit))
}

/// Connect to `database`, evaluate `spec`, and release the connection on
/// every path.
pub async fn check_target(
    connector: &dyn Connector,
    store: &CounterStore,
    database: &str,
    spec: &QuerySpec,
    thresholds: &Thresholds,
) -> Result<EvaluationResult, ProbeError> {
    let mut conn = connector.connect(Some(database)).await?;
    let result = evaluate(conn.as_mut(), connector.host(), store, database, spec, thresholds).await;

    if let Err(e) = conn.close().await {
        tracing::debug!(database, error = %e, "Failed to close connection cleanly");
    }

    result
}

/// Runs one check per database with bounded concurrency.
pub struct Scheduler {
    connector: Arc<dyn Connector>,
    store: Arc<CounterStore>,
    workers: usize,
    target_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<CounterStore>,
        config: &ProbeConfig,
    ) -> Self {
        Self {
            connector,
            store,
            workers: config.workers.max(1),
            target_timeout: config.target_timeout,
        }
    }

    /// Check every database and return once all of them finished or failed.
    ///
    /// Performance data is labelled with the database name. A failing
    /// database is recorded as [`TargetOutcome::Failed`] and does not stop
    /// the others.
    pub async fn run_batch(
        &self,
        databases: Vec<String>,
        spec: &QuerySpec,
        thresholds: &Thresholds,
    ) -> BTreeMap<String, TargetOutcome> {
        tracing::info!("Checking {} databases for {}", databases.len(), spec.mode);

        // Semaphore to limit concurrent connections
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let thresholds = Arc::new(thresholds.clone());
        let mut handles = Vec::with_capacity(databases.len());

        for database in databases {
            let semaphore = semaphore.clone();
            let connector = self.connector.clone();
            let store = self.store.clone();
            let thresholds = thresholds.clone();
            let spec = spec.with_label(&database);
            let timeout = self.target_timeout;
            let name = database.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok(); // Hold permit until done

                let check = check_target(connector.as_ref(), &store, &database, &spec, &thresholds);
                match tokio::time::timeout(timeout, check).await {
                    Ok(Ok(result)) => TargetOutcome::Evaluated(result),
                    Ok(Err(e)) => {
                        tracing::warn!(database = %database, error = %e, "Check failed");
                        TargetOutcome::Failed(e.to_string())
                    }
                    Err(_) => {
                        tracing::warn!(database = %database, ?timeout, "Check timed out");
                        TargetOutcome::Failed(format!("timed out after {:?}", timeout))
                    }
                }
            });
            handles.push((name, handle));
        }

        let mut results = BTreeMap::new();
        for (name, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(database = %name, error = %e, "Check task aborted");
                    TargetOutcome::Failed(format!("check task aborted: {}", e))
                }
            };
            results.insert(name, outcome);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mssql::fake::FakeConnector;
    use crate::mssql::{Catalog, DbError, Mode, Row, Value};
    use crate::threshold::Status;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn config(workers: usize, timeout: Duration) -> ProbeConfig {
        ProbeConfig {
            workers,
            target_timeout: timeout,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batch_labels_and_classifies_each_database() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::LogFileUsage).unwrap();
        let connector = FakeConnector::new("sql01")
            .respond(spec.sql_for("sales"), vec![vec![Value::Int(95)]])
            .respond(spec.sql_for("billing"), vec![vec![Value::Int(10)]]);
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path())),
            &config(2, Duration::from_secs(5)),
        );
        let thresholds = Thresholds::parse(Some("80"), Some("90")).unwrap();

        let results = scheduler
            .run_batch(vec!["sales".into(), "billing".into()], spec, &thresholds)
            .await;

        assert_eq!(
            results["sales"],
            TargetOutcome::Evaluated(EvaluationResult {
                value: Some(95.0),
                status: Status::Critical,
                perfdata: "'sales'=95.0%;80;90;;".to_string(),
            })
        );
        assert_eq!(
            results["billing"],
            TargetOutcome::Evaluated(EvaluationResult {
                value: Some(10.0),
                status: Status::Ok,
                perfdata: "'billing'=10.0%;80;90;;".to_string(),
            })
        );
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.released(), 2);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::ActiveTrans).unwrap();
        let connector = FakeConnector::new("sql01")
            .respond(spec.sql_for("sales"), vec![vec![Value::Int(3)]])
            .unreachable("offline");
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path())),
            &config(4, Duration::from_secs(5)),
        );

        let results = scheduler
            .run_batch(
                vec!["offline".into(), "sales".into(), "empty".into()],
                spec,
                &Thresholds::default(),
            )
            .await;

        assert!(matches!(results["offline"], TargetOutcome::Failed(_)));
        assert!(matches!(results["empty"], TargetOutcome::Failed(_)));
        assert!(matches!(results["sales"], TargetOutcome::Evaluated(_)));
        // Both connections that opened were released, including the failed query
        assert_eq!(connector.opened(), 2);
        assert_eq!(connector.released(), 2);
    }

    #[tokio::test]
    async fn test_slow_database_times_out() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::LogGrowths).unwrap();
        let connector = FakeConnector::new("sql01")
            .respond(spec.sql_for("slow"), vec![vec![Value::Int(1)]])
            .slow(spec.sql_for("slow"), Duration::from_secs(30))
            .respond(spec.sql_for("fast"), vec![vec![Value::Int(1)]]);
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path())),
            &config(1, Duration::from_millis(50)),
        );

        let results = scheduler
            .run_batch(vec!["slow".into(), "fast".into()], spec, &Thresholds::default())
            .await;

        match &results["slow"] {
            TargetOutcome::Failed(message) => assert!(message.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(matches!(results["fast"], TargetOutcome::Evaluated(_)));
        assert_eq!(connector.released(), 2);
    }

    /// Tracks how many connections are open at once. Queries on `broken` panic.
    #[derive(Clone, Default)]
    struct TrackingConnector {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for TrackingConnector {
        fn host(&self) -> &str {
            "sql01"
        }

        async fn connect(&self, database: Option<&str>) -> Result<Box<dyn Connection>, DbError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(TrackingConnection {
                database: database.unwrap_or_default().to_string(),
                active: self.active.clone(),
            }))
        }
    }

    struct TrackingConnection {
        database: String,
        active: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for TrackingConnection {
        async fn query(&mut self, _sql: &str) -> Result<Vec<Row>, DbError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            if self.database == "broken" {
                panic!("driver state corrupted");
            }
            Ok(vec![vec![Value::Int(1)]])
        }

        async fn close(self: Box<Self>) -> Result<(), DbError> {
            Ok(())
        }
    }

    impl Drop for TrackingConnection {
        fn drop(&mut self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn names(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[tokio::test]
    async fn test_batch_respects_worker_limit() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::ActiveTrans).unwrap();
        let connector = TrackingConnector::default();
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path())),
            &config(2, Duration::from_secs(5)),
        );

        let results = scheduler
            .run_batch(names("db", 8), spec, &Thresholds::default())
            .await;

        assert_eq!(results.len(), 8);
        assert!(results.values().all(|r| matches!(r, TargetOutcome::Evaluated(_))));
        assert_eq!(connector.peak.load(Ordering::SeqCst), 2);
        assert_eq!(connector.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_check_is_recorded_against_its_database() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::ActiveTrans).unwrap();
        let connector = TrackingConnector::default();
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path())),
            &config(4, Duration::from_secs(5)),
        );

        let results = scheduler
            .run_batch(
                vec!["sales".into(), "broken".into(), "billing".into()],
                spec,
                &Thresholds::default(),
            )
            .await;

        match &results["broken"] {
            TargetOutcome::Failed(message) => assert!(message.starts_with("check task aborted")),
            other => panic!("expected aborted task, got {:?}", other),
        }
        assert!(matches!(results["sales"], TargetOutcome::Evaluated(_)));
        assert!(matches!(results["billing"], TargetOutcome::Evaluated(_)));
        // The panicking task still released its connection while unwinding
        assert_eq!(connector.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rate_save_failure_fails_only_that_database() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::LogFlushes).unwrap();
        let connector = FakeConnector::new("sql01")
            .respond(spec.sql_for("sales"), vec![vec![Value::Int(10)]])
            .respond(spec.sql_for("billing"), vec![vec![Value::Int(20)]]);
        let dir = TempDir::new().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(connector.clone()),
            Arc::new(CounterStore::new(dir.path().join("missing"))),
            &config(2, Duration::from_secs(5)),
        );

        let results = scheduler
            .run_batch(vec!["sales".into(), "billing".into()], spec, &Thresholds::default())
            .await;

        assert_eq!(results.len(), 2);
        for name in ["sales", "billing"] {
            match &results[name] {
                TargetOutcome::Failed(message) => {
                    assert!(message.contains("failed to persist counter sample"), "{message}")
                }
                other => panic!("expected save failure, got {:?}", other),
            }
        }
        assert_eq!(connector.released(), 2);
    }
}
