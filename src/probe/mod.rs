//! Probe module: turns raw query output into a checked value.
//!
//! Supports direct, ratio and rate strategies.

mod direct;
mod rate;
mod ratio;

pub use direct::*;
pub use rate::*;
pub use ratio::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::{CounterStore, StateError};
use crate::mssql::{Connection, DbError, QuerySpec, StrategyKind};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("query execution error: {0}")]
    QueryExecution(String),
    #[error("expected at least {expected} rows, got {actual}")]
    InsufficientRows { expected: usize, actual: usize },
    #[error("malformed result: {0}")]
    MalformedResult(String),
    #[error("no time elapsed since the previous sample")]
    DegenerateInterval,
    #[error(transparent)]
    State(#[from] StateError),
}

/// Everything a strategy needs besides the connection and the query.
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext<'a> {
    /// Server identity, part of the counter key.
    pub host: &'a str,
    pub database: &'a str,
    pub store: &'a CounterStore,
    /// Observation time recorded for rate samples.
    pub now: DateTime<Utc>,
}

/// Run the strategy of `spec` against `database`.
///
/// Returns `None` only when a rate check recorded its first sample.
pub async fn run_probe(
    conn: &mut dyn Connection,
    spec: &QuerySpec,
    ctx: &ProbeContext<'_>,
) -> Result<Option<f64>, ProbeError> {
    let sql = spec.sql_for(ctx.database);

    let result = match spec.strategy {
        StrategyKind::Direct => run_direct_probe(conn, &sql, spec.modifier).await.map(Some),
        StrategyKind::Ratio => run_ratio_probe(conn, &sql, spec.modifier).await.map(Some),
        StrategyKind::Rate => run_rate_probe(conn, &sql, spec.modifier, ctx).await,
    };

    if let Err(e) = &result {
        tracing::debug!(mode = %spec.mode, database = ctx.database, error = %e, "Probe failed");
    }

    result
}

/// Round to two decimal places, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mssql::fake::FakeConnector;
    use crate::mssql::{Catalog, Connector, DatasizeUnit, Mode, Value};
    use tempfile::TempDir;

    #[test]
    fn test_round2() {
        assert_eq!(round2(2.0), 2.0);
        assert_eq!(round2(1.005_1), 1.01);
        assert_eq!(round2(33.333_333), 33.33);
        assert_eq!(round2(-2.346), -2.35);
    }

    #[tokio::test]
    async fn test_datasize_override_scales_kilobytes() {
        let catalog = Catalog::new();
        let spec = catalog.resolve(Mode::DataSize, Some(DatasizeUnit::MB)).unwrap();
        let connector = FakeConnector::new("sql01")
            .respond(spec.sql_for("sales"), vec![vec![Value::Int(2048)]]);
        let dir = TempDir::new().unwrap();
        let store = CounterStore::new(dir.path());
        let ctx = ProbeContext {
            host: "sql01",
            database: "sales",
            store: &store,
            now: Utc::now(),
        };

        let mut conn = connector.connect(Some("sales")).await.unwrap();
        let value = run_probe(conn.as_mut(), &spec, &ctx).await.unwrap();
        assert_eq!(value, Some(2.0));
    }

    #[tokio::test]
    async fn test_dispatch_ratio() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::LogCacheHit).unwrap();
        let connector = FakeConnector::new("sql01").respond(
            spec.sql_for("sales"),
            vec![vec![Value::Int(50)], vec![Value::Int(200)]],
        );
        let dir = TempDir::new().unwrap();
        let store = CounterStore::new(dir.path());
        let ctx = ProbeContext {
            host: "sql01",
            database: "sales",
            store: &store,
            now: Utc::now(),
        };

        let mut conn = connector.connect(Some("sales")).await.unwrap();
        let value = run_probe(conn.as_mut(), spec, &ctx).await.unwrap();
        assert_eq!(value, Some(25.0));
    }

    #[tokio::test]
    async fn test_query_failure_surfaces_db_error() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::ActiveTrans).unwrap();
        let connector = FakeConnector::new("sql01");
        let dir = TempDir::new().unwrap();
        let store = CounterStore::new(dir.path());
        let ctx = ProbeContext {
            host: "sql01",
            database: "sales",
            store: &store,
            now: Utc::now(),
        };

        let mut conn = connector.connect(Some("sales")).await.unwrap();
        let err = run_probe(conn.as_mut(), spec, &ctx).await.unwrap_err();
        assert!(matches!(err, ProbeError::Db(DbError::Query(_))));
    }
}
