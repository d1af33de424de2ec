//! Command line interface.
//!
//! The fixed options are derived; the mode flags come from the catalog and
//! are added to the command at build time as one mutually exclusive group.

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgGroup, Command, CommandFactory, FromArgMatches, Parser};

use crate::error::CheckError;
use crate::mssql::{Credentials, DatabaseFilter, DatasizeUnit, Mode, ServerAddress};
use crate::runner::CheckOptions;
use crate::threshold::Thresholds;

#[derive(Parser, Debug)]
#[command(
    name = "check_mssql_database",
    version,
    about = "Check various performance counters of a SQL Server database."
)]
pub struct Cli {
    /// Server to connect to
    #[arg(short = 'H', long)]
    pub hostname: String,

    #[arg(short = 'U', long)]
    pub user: String,

    #[arg(short = 'P', long)]
    pub password: String,

    /// Named instance, resolved through the SQL Browser service
    #[arg(short = 'I', long, conflicts_with = "port")]
    pub instance: Option<String>,

    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Check only this database; every database is checked otherwise
    #[arg(short = 'D', long)]
    pub database: Option<String>,

    /// Skip databases whose name starts with a match of this regex
    #[arg(long, conflicts_with = "include_databases")]
    pub exclude_databases: Option<String>,

    /// Check only databases whose name starts with a match of this regex
    #[arg(long)]
    pub include_databases: Option<String>,

    /// Match database filters case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Warning threshold range
    #[arg(short = 'w', long, allow_hyphen_values = true)]
    pub warning: Option<String>,

    /// Critical threshold range
    #[arg(short = 'c', long, allow_hyphen_values = true)]
    pub critical: Option<String>,

    /// Unit for datasize and logsize: B, KB, MB, GB or TB
    #[arg(short = 'd', long)]
    pub datasize_unit: Option<DatasizeUnit>,

    /// Omit performance data from the output
    #[arg(short = 'n', long)]
    pub no_perfdata: bool,

    /// Print every database on the server and exit
    #[arg(short = 'l', long)]
    pub list_databases: bool,

    #[arg(skip)]
    pub mode: Option<Mode>,
}

impl Cli {
    /// The full command, mode flags included.
    pub fn build_command() -> Command {
        let mut cmd = <Self as CommandFactory>::command();
        for mode in Mode::ALL {
            cmd = cmd.arg(
                Arg::new(mode.flag())
                    .long(mode.flag())
                    .help(mode.help())
                    .action(ArgAction::SetTrue),
            );
        }
        cmd.group(
            ArgGroup::new("mode")
                .args(Mode::ALL.map(Mode::flag))
                .multiple(false),
        )
    }

    /// Parse arguments, failing with a clap error on bad usage.
    pub fn parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cmd = Self::build_command();
        let matches = cmd.try_get_matches_from_mut(args)?;
        let mut cli = Self::from_arg_matches(&matches)?;
        cli.mode = Mode::ALL.into_iter().find(|m| matches.get_flag(m.flag()));

        if cli.mode == Some(Mode::Test) && cli.database.is_none() {
            return Err(cmd.error(
                ErrorKind::MissingRequiredArgument,
                "--test requires --database",
            ));
        }

        Ok(cli)
    }

    /// Selected mode, `time2connect` when none was given.
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Time2Connect)
    }

    /// Validate thresholds and filters and split into connection details
    /// and check options. Runs before anything touches the network.
    pub fn into_parts(self) -> Result<(ServerAddress, Credentials, CheckOptions), CheckError> {
        let thresholds = Thresholds::parse(self.warning.as_deref(), self.critical.as_deref())?;
        let filter = DatabaseFilter::new(
            self.include_databases.as_deref(),
            self.exclude_databases.as_deref(),
            self.case_sensitive,
        )?;
        let mode = self.mode();

        let address = ServerAddress {
            hostname: self.hostname,
            instance: self.instance,
            port: self.port,
        };
        let credentials = Credentials {
            user: self.user,
            password: self.password,
        };
        let options = CheckOptions {
            database: self.database,
            filter,
            thresholds,
            mode,
            datasize_unit: self.datasize_unit,
            perfdata: !self.no_perfdata,
            list_databases: self.list_databases,
        };

        Ok((address, credentials, options))
    }
}

/// Collapse a rendered clap error into one line, keeping every detail
/// line but dropping the usage and help hints.
pub fn usage_message(err: &clap::Error) -> String {
    err.to_string()
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("Usage:")
                && !line.starts_with("For more information")
        })
        .map(|line| line.strip_prefix("error: ").unwrap_or(line))
        .collect::<Vec<_>>()
        .join(" ")
}
