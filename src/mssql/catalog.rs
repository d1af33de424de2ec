//! The fixed catalog of check modes.
//!
//! Built once at startup and never mutated. A datasize unit override yields
//! a derived [`QuerySpec`] rather than changing the shared entry.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::threshold::format_value;

const DATABASE_PLACEHOLDER: &str = "{database}";

/// Every mode flag the plugin accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    LogCacheHit,
    ActiveTrans,
    LogFlushes,
    LogFileUsage,
    TransPerSec,
    LogGrowths,
    LogShrinks,
    LogTruncs,
    LogWait,
    DataSize,
    LogSize,
    Time2Connect,
    Test,
}

impl Mode {
    pub const ALL: [Mode; 13] = [
        Mode::LogCacheHit,
        Mode::ActiveTrans,
        Mode::LogFlushes,
        Mode::LogFileUsage,
        Mode::TransPerSec,
        Mode::LogGrowths,
        Mode::LogShrinks,
        Mode::LogTruncs,
        Mode::LogWait,
        Mode::DataSize,
        Mode::LogSize,
        Mode::Time2Connect,
        Mode::Test,
    ];

    /// Command line flag name, without dashes.
    pub fn flag(self) -> &'static str {
        match self {
            Mode::LogCacheHit => "logcachehit",
            Mode::ActiveTrans => "activetrans",
            Mode::LogFlushes => "logflushes",
            Mode::LogFileUsage => "logfileusage",
            Mode::TransPerSec => "transpec",
            Mode::LogGrowths => "loggrowths",
            Mode::LogShrinks => "logshrinks",
            Mode::LogTruncs => "logtruncs",
            Mode::LogWait => "logwait",
            Mode::DataSize => "datasize",
            Mode::LogSize => "logsize",
            Mode::Time2Connect => "time2connect",
            Mode::Test => "test",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Mode::LogCacheHit => "Log Cache Hit Ratio",
            Mode::ActiveTrans => "Active Transactions",
            Mode::LogFlushes => "Log Flushes Per Second",
            Mode::LogFileUsage => "Log File Usage",
            Mode::TransPerSec => "Transactions Per Second",
            Mode::LogGrowths => "Log Growths",
            Mode::LogShrinks => "Log Shrinks",
            Mode::LogTruncs => "Log Truncations",
            Mode::LogWait => "Log Flush Wait Time",
            Mode::DataSize => "Database Size",
            Mode::LogSize => "Log File Size",
            Mode::Time2Connect => "Time to connect to the database.",
            Mode::Test => "Run tests of all queries against the database.",
        }
    }

    /// Whether the mode reports a data size and honours `--datasize-unit`.
    pub fn is_datasize(self) -> bool {
        matches!(self, Mode::DataSize | Mode::LogSize)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

/// How a raw query result becomes the checked value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// One scalar, scaled.
    Direct,
    /// First row over second row, scaled.
    Ratio,
    /// Per-second change since the previous run.
    Rate,
}

/// Display unit for data size modes. Counters report kilobytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasizeUnit {
    B,
    KB,
    MB,
    GB,
    TB,
}

impl DatasizeUnit {
    /// Factor converting kilobytes into this unit.
    pub fn modifier(self) -> f64 {
        match self {
            DatasizeUnit::B => 1024.0,
            DatasizeUnit::KB => 1.0,
            DatasizeUnit::MB => 1.0 / 1024.0,
            DatasizeUnit::GB => 1.0 / (1024.0 * 1024.0),
            DatasizeUnit::TB => 1.0 / (1024.0 * 1024.0 * 1024.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasizeUnit::B => "B",
            DatasizeUnit::KB => "KB",
            DatasizeUnit::MB => "MB",
            DatasizeUnit::GB => "GB",
            DatasizeUnit::TB => "TB",
        }
    }
}

impl FromStr for DatasizeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "B" => Ok(DatasizeUnit::B),
            "KB" => Ok(DatasizeUnit::KB),
            "MB" => Ok(DatasizeUnit::MB),
            "GB" => Ok(DatasizeUnit::GB),
            "TB" => Ok(DatasizeUnit::TB),
            other => Err(format!(
                "invalid datasize unit {:?}, expected one of B, KB, MB, GB, TB",
                other
            )),
        }
    }
}

/// One catalog entry: the query and how to present its result.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub mode: Mode,
    /// Query text with a `{database}` placeholder.
    pub sql_template: String,
    /// Message text placed before the value.
    pub message: String,
    /// Unit shown after the value in the message.
    pub message_unit: String,
    pub label: String,
    /// Unit shown after the value in performance data.
    pub unit: String,
    pub strategy: StrategyKind,
    pub modifier: f64,
}

impl QuerySpec {
    fn new(
        mode: Mode,
        sql_template: String,
        message: &str,
        message_unit: &str,
        label: &str,
        unit: &str,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            mode,
            sql_template,
            message: message.to_string(),
            message_unit: message_unit.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            strategy,
            modifier: 1.0,
        }
    }

    fn with_modifier(mut self, modifier: f64) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn help(&self) -> &'static str {
        self.mode.help()
    }

    /// The query bound to `database`.
    pub fn sql_for(&self, database: &str) -> String {
        self.sql_template
            .replace(DATABASE_PLACEHOLDER, &database.replace('\'', "''"))
    }

    /// A copy reporting in `unit`. Non-datasize entries are returned unchanged.
    pub fn with_datasize_unit(&self, unit: DatasizeUnit) -> QuerySpec {
        let mut spec = self.clone();
        if self.mode.is_datasize() {
            spec.unit = unit.as_str().to_string();
            spec.message_unit = unit.as_str().to_string();
            spec.modifier = unit.modifier();
        }
        spec
    }

    /// A copy using `label` in performance data.
    pub fn with_label(&self, label: &str) -> QuerySpec {
        let mut spec = self.clone();
        spec.label = label.to_string();
        spec
    }

    /// Human readable status text for a result.
    pub fn describe(&self, value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{}{}{}", self.message, format_value(v), self.message_unit),
            None => format!("{} has no previous sample, baseline recorded", self.help()),
        }
    }
}

fn counter_query(counter: &str) -> String {
    format!(
        "SELECT cntr_value FROM sys.dm_os_performance_counters WHERE counter_name='{}' AND instance_name='{}';",
        counter, DATABASE_PLACEHOLDER
    )
}

/// Matches a counter and its companion `... Base` counter, value first.
fn counter_prefix_query(counter: &str) -> String {
    format!(
        "SELECT cntr_value FROM sys.dm_os_performance_counters WHERE counter_name LIKE '{}%' AND instance_name='{}' ORDER BY counter_name;",
        counter, DATABASE_PLACEHOLDER
    )
}

/// Immutable registry of query modes.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: BTreeMap<Mode, QuerySpec>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        use StrategyKind::*;

        let entries = [
            QuerySpec::new(
                Mode::LogCacheHit,
                counter_prefix_query("Log Cache Hit Ratio"),
                "Log Cache Hit Ratio is ",
                "%",
                "log_cache_hit_ratio",
                "%",
                Ratio,
            )
            .with_modifier(100.0),
            QuerySpec::new(
                Mode::ActiveTrans,
                counter_query("Active Transactions"),
                "Active Transactions is ",
                "",
                "active_transactions",
                "",
                Direct,
            ),
            QuerySpec::new(
                Mode::LogFlushes,
                counter_query("Log Flushes/sec"),
                "Log Flushes Per Second is ",
                "/sec",
                "log_flushes_per_sec",
                "",
                Rate,
            ),
            QuerySpec::new(
                Mode::LogFileUsage,
                counter_query("Percent Log Used"),
                "Log File Usage is ",
                "%",
                "log_file_usage",
                "%",
                Direct,
            ),
            QuerySpec::new(
                Mode::TransPerSec,
                counter_query("Transactions/sec"),
                "Transactions Per Second is ",
                "/sec",
                "transactions_per_sec",
                "",
                Rate,
            ),
            QuerySpec::new(
                Mode::LogGrowths,
                counter_query("Log Growths"),
                "Log Growths is ",
                "",
                "log_growths",
                "",
                Direct,
            ),
            QuerySpec::new(
                Mode::LogShrinks,
                counter_query("Log Shrinks"),
                "Log Shrinks is ",
                "",
                "log_shrinks",
                "",
                Direct,
            ),
            QuerySpec::new(
                Mode::LogTruncs,
                counter_query("Log Truncations"),
                "Log Truncations is ",
                "",
                "log_truncations",
                "",
                Direct,
            ),
            QuerySpec::new(
                Mode::LogWait,
                counter_query("Log Flush Wait Time"),
                "Log Flush Wait Time is ",
                "ms",
                "log_wait_time",
                "ms",
                Direct,
            ),
            QuerySpec::new(
                Mode::DataSize,
                counter_query("Data File(s) Size (KB)"),
                "Database size is ",
                "KB",
                "database_size",
                "KB",
                Direct,
            ),
            QuerySpec::new(
                Mode::LogSize,
                counter_query("Log File(s) Size (KB)"),
                "Log file size is ",
                "KB",
                "logfile_size",
                "KB",
                Direct,
            ),
        ]
        .into_iter()
        .map(|spec| (spec.mode, spec))
        .collect();

        Self { entries }
    }

    /// The entry for a query mode; `None` for `time2connect` and `test`.
    pub fn get(&self, mode: Mode) -> Option<&QuerySpec> {
        self.entries.get(&mode)
    }

    /// Resolve a mode, applying the unit override when one is given.
    pub fn resolve(&self, mode: Mode, unit: Option<DatasizeUnit>) -> Option<QuerySpec> {
        let spec = self.get(mode)?;
        Some(match unit {
            Some(unit) => spec.with_datasize_unit(unit),
            None => spec.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuerySpec> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_covers_every_query_mode() {
        let catalog = Catalog::new();
        assert_eq!(catalog.iter().count(), 11);
        for mode in Mode::ALL {
            let is_query = !matches!(mode, Mode::Time2Connect | Mode::Test);
            assert_eq!(catalog.get(mode).is_some(), is_query, "{mode}");
        }
    }

    #[test]
    fn test_strategies() {
        let catalog = Catalog::new();
        assert_eq!(catalog.get(Mode::LogCacheHit).unwrap().strategy, StrategyKind::Ratio);
        assert_eq!(catalog.get(Mode::LogCacheHit).unwrap().modifier, 100.0);
        assert_eq!(catalog.get(Mode::LogFlushes).unwrap().strategy, StrategyKind::Rate);
        assert_eq!(catalog.get(Mode::TransPerSec).unwrap().strategy, StrategyKind::Rate);
        assert_eq!(catalog.get(Mode::DataSize).unwrap().strategy, StrategyKind::Direct);
    }

    #[test]
    fn test_sql_binds_and_escapes_database() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::ActiveTrans).unwrap();
        assert_eq!(
            spec.sql_for("sales"),
            "SELECT cntr_value FROM sys.dm_os_performance_counters WHERE counter_name='Active Transactions' AND instance_name='sales';"
        );
        assert!(spec.sql_for("o'brien").contains("instance_name='o''brien'"));
    }

    #[test]
    fn test_datasize_override_is_a_derived_copy() {
        let catalog = Catalog::new();
        let derived = catalog.resolve(Mode::DataSize, Some(DatasizeUnit::MB)).unwrap();
        assert_eq!(derived.unit, "MB");
        assert_eq!(derived.modifier, 1.0 / 1024.0);
        assert_eq!(derived.describe(Some(2.0)), "Database size is 2.0MB");

        // Shared entry is untouched
        let original = catalog.get(Mode::DataSize).unwrap();
        assert_eq!(original.unit, "KB");
        assert_eq!(original.modifier, 1.0);
    }

    #[test]
    fn test_datasize_override_ignored_for_other_modes() {
        let catalog = Catalog::new();
        let spec = catalog.resolve(Mode::LogWait, Some(DatasizeUnit::GB)).unwrap();
        assert_eq!(&spec, catalog.get(Mode::LogWait).unwrap());
    }

    #[test]
    fn test_datasize_unit_parse() {
        assert_eq!("mb".parse::<DatasizeUnit>(), Ok(DatasizeUnit::MB));
        assert_eq!("TB".parse::<DatasizeUnit>(), Ok(DatasizeUnit::TB));
        assert!("PB".parse::<DatasizeUnit>().is_err());
        assert_eq!(DatasizeUnit::B.modifier(), 1024.0);
    }

    #[test]
    fn test_mode_flags_are_unique() {
        let flags: std::collections::HashSet<_> = Mode::ALL.iter().map(|m| m.flag()).collect();
        assert_eq!(flags.len(), Mode::ALL.len());
    }

    #[test]
    fn test_describe() {
        let catalog = Catalog::new();
        let spec = catalog.get(Mode::LogFlushes).unwrap();
        assert_eq!(spec.describe(Some(12.5)), "Log Flushes Per Second is 12.5/sec");
        assert_eq!(
            spec.describe(None),
            "Log Flushes Per Second has no previous sample, baseline recorded"
        );
    }
}
