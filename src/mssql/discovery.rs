//! Database discovery and include/exclude filtering.

use regex::{Regex, RegexBuilder};

use super::{Connection, DbError, Value};

pub const LIST_DATABASES_QUERY: &str = "SELECT NAME FROM sys.sysdatabases;";

/// Names of every database on the server, in server order.
pub async fn list_databases(conn: &mut dyn Connection) -> Result<Vec<String>, DbError> {
    let rows = conn.query(LIST_DATABASES_QUERY).await?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(Value::Text(name)) => Some(name),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect())
}

/// Which discovered databases to check.
///
/// Patterns match from the start of the name, like a prefix.
#[derive(Debug, Clone, Default)]
pub enum DatabaseFilter {
    #[default]
    All,
    Include(Regex),
    Exclude(Regex),
}

impl DatabaseFilter {
    /// Build a filter from the include/exclude options. At most one may be set.
    pub fn new(
        include: Option<&str>,
        exclude: Option<&str>,
        case_sensitive: bool,
    ) -> Result<Self, regex::Error> {
        let compile = |pattern: &str| {
            RegexBuilder::new(&format!("^(?:{})", pattern))
                .case_insensitive(!case_sensitive)
                .build()
        };

        match (include, exclude) {
            (_, Some(pattern)) => Ok(Self::Exclude(compile(pattern)?)),
            (Some(pattern), None) => Ok(Self::Include(compile(pattern)?)),
            (None, None) => Ok(Self::All),
        }
    }

    pub fn accepts(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(re) => re.is_match(name),
            Self::Exclude(re) => !re.is_match(name),
        }
    }

    pub fn apply(&self, names: Vec<String>) -> Vec<String> {
        names.into_iter().filter(|n| self.accepts(n)).collect()
    }
}
