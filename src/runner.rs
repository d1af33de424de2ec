//! Top-level check flow.
//!
//! Connects once, then either lists databases, runs the self test, reports
//! the connection time, checks one database, or fans out over every
//! database and aggregates. The result is an [`Outcome`]; mapping it to
//! stdout and an exit code is left to the binary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ProbeConfig;
use crate::db::CounterStore;
use crate::error::{CheckError, Result};
use crate::mssql::{
    list_databases, Catalog, Connection, Connector, DatabaseFilter, DatasizeUnit, Mode,
};
use crate::scheduler::{aggregate, evaluate, Scheduler};
use crate::threshold::{classify, format_value, Status, Thresholds};

/// What to check, as chosen on the command line.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Single database to check; `None` checks every database.
    pub database: Option<String>,
    pub filter: DatabaseFilter,
    pub thresholds: Thresholds,
    pub mode: Mode,
    pub datasize_unit: Option<DatasizeUnit>,
    pub perfdata: bool,
    pub list_databases: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            database: None,
            filter: DatabaseFilter::All,
            thresholds: Thresholds::default(),
            mode: Mode::Time2Connect,
            datasize_unit: None,
            perfdata: true,
            list_databases: false,
        }
    }
}

/// Final status and the text to print.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    pub output: String,
}

impl Outcome {
    /// `STATUS: message|perfdata`, perf data only when requested.
    pub fn check(status: Status, message: &str, perfdata: &str, include_perfdata: bool) -> Self {
        let output = if include_perfdata && !perfdata.is_empty() {
            format!("{}: {}|{}", status, message, perfdata)
        } else {
            format!("{}: {}", status, message)
        };
        Self { status, output }
    }

    /// `STATUS: message`, with any perf data already in the message.
    pub fn report(status: Status, message: &str) -> Self {
        Self {
            status,
            output: format!("{}: {}", status, message),
        }
    }

    /// Plain multi-line output.
    pub fn listing(status: Status, lines: Vec<String>) -> Self {
        Self {
            status,
            output: lines.join("\n"),
        }
    }

    /// A single UNKNOWN line describing `error`.
    pub fn unknown(error: impl std::fmt::Display) -> Self {
        let message = error.to_string();
        let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
        Self {
            status: Status::Unknown,
            output: format!("{}: {}", Status::Unknown, message),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// Drives one invocation against one server.
pub struct Runner {
    connector: Arc<dyn Connector>,
    store: Arc<CounterStore>,
    catalog: Catalog,
    scheduler: Scheduler,
}

impl Runner {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: CounterStore,
        catalog: Catalog,
        config: &ProbeConfig,
    ) -> Self {
        let store = Arc::new(store);
        let scheduler = Scheduler::new(connector.clone(), store.clone(), config);
        Self {
            connector,
            store,
            catalog,
            scheduler,
        }
    }

    /// Run the check described by `options`.
    ///
    /// Failing to make the first connection fails the whole run.
    pub async fn run(&self, options: &CheckOptions) -> Result<Outcome> {
        let started = Instant::now();
        let mut conn = self.connector.connect(options.database.as_deref()).await?;
        let connect_time = started.elapsed();
        tracing::debug!(
            host = self.connector.host(),
            elapsed_ms = connect_time.as_millis() as u64,
            "Connected"
        );

        let outcome = self.dispatch(conn.as_mut(), connect_time, options).await;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Failed to close connection cleanly");
        }

        outcome
    }

    async fn dispatch(
        &self,
        conn: &mut dyn Connection,
        connect_time: Duration,
        options: &CheckOptions,
    ) -> Result<Outcome> {
        if options.list_databases {
            let names = list_databases(conn).await?;
            return Ok(Outcome::listing(Status::Ok, names));
        }

        match options.mode {
            Mode::Test => self.run_tests(conn, options).await,
            Mode::Time2Connect => Ok(time_to_connect(connect_time, options)),
            mode => self.run_mode_check(conn, mode, options).await,
        }
    }

    async fn run_mode_check(
        &self,
        conn: &mut dyn Connection,
        mode: Mode,
        options: &CheckOptions,
    ) -> Result<Outcome> {
        let spec = self
            .catalog
            .resolve(mode, options.datasize_unit)
            .ok_or_else(|| CheckError::Usage(format!("{} is not a query mode", mode)))?;

        match options.database.as_deref() {
            Some(database) => {
                let result = evaluate(
                    conn,
                    self.connector.host(),
                    &self.store,
                    database,
                    &spec,
                    &options.thresholds,
                )
                .await?;
                Ok(Outcome::check(
                    result.status,
                    &spec.describe(result.value),
                    &result.perfdata,
                    options.perfdata,
                ))
            }
            None => {
                let databases = options.filter.apply(list_databases(conn).await?);
                let results = self
                    .scheduler
                    .run_batch(databases, &spec, &options.thresholds)
                    .await;
                let report = aggregate(&results, spec.help(), options.perfdata);
                Ok(Outcome::report(report.status, &report.message))
            }
        }
    }

    /// Run every query mode against one database and report which work.
    async fn run_tests(
        &self,
        conn: &mut dyn Connection,
        options: &CheckOptions,
    ) -> Result<Outcome> {
        let database = options.database.as_deref().ok_or_else(|| {
            CheckError::Usage("When running in test mode you must specify a database.".to_string())
        })?;

        let mut lines = Vec::new();
        let mut failed = 0;

        for entry in self.catalog.iter() {
            let spec = match options.datasize_unit {
                Some(unit) => entry.with_datasize_unit(unit),
                None => entry.clone(),
            };
            let result = evaluate(
                conn,
                self.connector.host(),
                &self.store,
                database,
                &spec,
                &options.thresholds,
            )
            .await;

            match result {
                Ok(_) => lines.push(format!("{} passed!", spec.mode)),
                Err(e) => {
                    failed += 1;
                    lines.push(format!("{} failed with: {}", spec.mode, e));
                }
            }
        }

        let total = lines.len();
        lines.push(format!("{}/{} tests failed.", failed, total));
        let status = if failed == 0 { Status::Ok } else { Status::Unknown };
        Ok(Outcome::listing(status, lines))
    }
}

fn time_to_connect(elapsed: Duration, options: &CheckOptions) -> Outcome {
    let seconds = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
    let result = classify(Some(seconds), &options.thresholds, "time", "s");
    Outcome::check(
        result.status,
        &format!("Time to connect was {}s", format_value(seconds)),
        &result.perfdata,
        options.perfdata,
    )
}
