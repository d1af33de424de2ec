//! check_mssql_database - SQL Server database check plugin

use std::sync::Arc;

use clap::error::ErrorKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use check_mssql_database::cli::{usage_message, Cli};
use check_mssql_database::config::ProbeConfig;
use check_mssql_database::db::CounterStore;
use check_mssql_database::error::CheckError;
use check_mssql_database::mssql::{Catalog, SqlServerConnector};
use check_mssql_database::runner::{Outcome, Runner};

#[tokio::main]
async fn main() {
    // Logs go to stderr, stdout carries only the plugin output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("check_mssql_database=warn")),
        )
        .init();

    let outcome = match Cli::parse_args(std::env::args_os()) {
        Ok(cli) => run(cli).await.unwrap_or_else(Outcome::unknown),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            Outcome::unknown(usage_message(&e))
        }
    };

    println!("{}", outcome.output);
    std::process::exit(outcome.exit_code());
}

async fn run(cli: Cli) -> Result<Outcome, CheckError> {
    let (address, credentials, options) = cli.into_parts()?;

    let config = ProbeConfig::load();
    tracing::debug!(
        state_dir = %config.state_dir.display(),
        workers = config.workers,
        "Loaded configuration"
    );

    let connector = SqlServerConnector::new(address, credentials, config.trust_cert);
    let store = CounterStore::new(config.state_dir.clone());
    let runner = Runner::new(Arc::new(connector), store, Catalog::new(), &config);

    runner.run(&options).await
}
