//! TDS connector built on tiberius.

use std::fmt;

use async_trait::async_trait;
use tiberius::{AuthMethod, Client, ColumnData, Config, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{Connection, Connector, DbError, Row, Value};

/// Where the server lives. Instance and port are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerAddress {
    pub hostname: String,
    pub instance: Option<String>,
    pub port: Option<u16>,
}

impl ServerAddress {
    /// `host`, `host\INSTANCE` or `host:port`.
    pub fn identity(&self) -> String {
        match (&self.instance, self.port) {
            (Some(instance), _) => format!("{}\\{}", self.hostname, instance),
            (None, Some(port)) => format!("{}:{}", self.hostname, port),
            (None, None) => self.hostname.clone(),
        }
    }
}

/// SQL Server login.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connector for a real SQL Server.
pub struct SqlServerConnector {
    address: ServerAddress,
    credentials: Credentials,
    trust_cert: bool,
    host: String,
}

impl SqlServerConnector {
    pub fn new(address: ServerAddress, credentials: Credentials, trust_cert: bool) -> Self {
        let host = address.identity();
        Self {
            address,
            credentials,
            trust_cert,
            host,
        }
    }

    fn config(&self, database: Option<&str>) -> Config {
        let mut config = Config::new();
        config.host(&self.address.hostname);
        if let Some(port) = self.address.port {
            config.port(port);
        }
        if let Some(instance) = &self.address.instance {
            config.instance_name(instance);
        }
        config.authentication(AuthMethod::sql_server(
            &self.credentials.user,
            &self.credentials.password,
        ));
        if let Some(database) = database {
            config.database(database);
        }
        if self.trust_cert {
            config.trust_cert();
        }
        config
    }
}

#[async_trait]
impl Connector for SqlServerConnector {
    fn host(&self) -> &str {
        &self.host
    }

    async fn connect(&self, database: Option<&str>) -> Result<Box<dyn Connection>, DbError> {
        let config = self.config(database);

        // Named instances are resolved through the SQL Browser service
        let tcp = if self.address.instance.is_some() {
            TcpStream::connect_named(&config)
                .await
                .map_err(|e| DbError::Connection(e.to_string()))?
        } else {
            TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| DbError::Connection(format!("{}: {}", self.host, e)))?
        };
        tcp.set_nodelay(true)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        tracing::debug!(host = %self.host, database = ?database, "Connected to SQL Server");
        Ok(Box::new(SqlServerConnection { client }))
    }
}

struct SqlServerConnection {
    client: Client<Compat<TcpStream>>,
}

#[async_trait]
impl Connection for SqlServerConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DbError> {
        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;
        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::from).collect())
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        self.client
            .close()
            .await
            .map_err(|e| DbError::Connection(e.to_string()))
    }
}

impl From<ColumnData<'static>> for Value {
    fn from(data: ColumnData<'static>) -> Self {
        match data {
            ColumnData::U8(v) => v.map_or(Value::Null, |v| Value::Int(v.into())),
            ColumnData::I16(v) => v.map_or(Value::Null, |v| Value::Int(v.into())),
            ColumnData::I32(v) => v.map_or(Value::Null, |v| Value::Int(v.into())),
            ColumnData::I64(v) => v.map_or(Value::Null, Value::Int),
            ColumnData::F32(v) => v.map_or(Value::Null, |v| Value::Float(v.into())),
            ColumnData::F64(v) => v.map_or(Value::Null, Value::Float),
            ColumnData::Numeric(v) => v.map_or(Value::Null, |n| Value::Float(f64::from(n))),
            ColumnData::String(v) => v.map_or(Value::Null, |s| Value::Text(s.into_owned())),
            other => Value::Text(format!("{:?}", other)),
        }
    }
}
