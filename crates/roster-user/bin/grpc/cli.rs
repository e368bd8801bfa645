use clap::{Parser, ValueEnum};
use roster_core::{StorageBackend, StorageParameters};
use roster_user::config::DEFAULT_MONGO_DATABASE;
use roster_user::telemetry::LogFormat;
use roster_user::ServiceConfig;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "ROSTER_USER_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "ROSTER_USER_STORAGE";
pub const MYSQL_DSN_ENV: &str = "ROSTER_USER_MYSQL_DSN";
pub const MYSQL_PASSWORD_ENV: &str = "ROSTER_USER_MYSQL_PASSWORD";
pub const MONGO_URI_ENV: &str = "ROSTER_USER_MONGO_URI";
pub const MONGO_DATABASE_ENV: &str = "ROSTER_USER_MONGO_DATABASE";
pub const ADD_QUERY_TIMEOUT_ENV: &str = "ROSTER_USER_ADD_QUERY_TIMEOUT_MS";
pub const GET_QUERY_TIMEOUT_ENV: &str = "ROSTER_USER_GET_QUERY_TIMEOUT_MS";
pub const COUNT_QUERY_TIMEOUT_ENV: &str = "ROSTER_USER_COUNT_QUERY_TIMEOUT_MS";
pub const LOG_LEVEL_ENV: &str = "ROSTER_USER_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "ROSTER_USER_LOG_FORMAT";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "memory")]
    Memory,
    #[value(name = "mysql")]
    Mysql,
    #[value(name = "mongo")]
    Mongo,
}

impl From<StorageBackendArg> for StorageBackend {
    fn from(arg: StorageBackendArg) -> Self {
        match arg {
            StorageBackendArg::Memory => StorageBackend::Memory,
            StorageBackendArg::Mysql => StorageBackend::MySql,
            StorageBackendArg::Mongo => StorageBackend::Mongo,
        }
    }
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", StorageBackend::from(*self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "roster-user-server", version)]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::Memory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Overrides any password in the MySQL DSN.
    #[arg(long, env = MYSQL_PASSWORD_ENV, hide_env_values = true)]
    pub mysql_password: Option<String>,

    #[arg(long, env = MONGO_URI_ENV, required_if_eq("storage", "mongo"))]
    pub mongo_uri: Option<String>,

    #[arg(long, env = MONGO_DATABASE_ENV, default_value = DEFAULT_MONGO_DATABASE)]
    pub mongo_database: String,

    #[arg(long, env = ADD_QUERY_TIMEOUT_ENV, default_value_t = DEFAULT_QUERY_TIMEOUT_MS)]
    pub add_query_timeout_ms: u64,

    #[arg(long, env = GET_QUERY_TIMEOUT_ENV, default_value_t = DEFAULT_QUERY_TIMEOUT_MS)]
    pub get_query_timeout_ms: u64,

    #[arg(long, env = COUNT_QUERY_TIMEOUT_ENV, default_value_t = DEFAULT_QUERY_TIMEOUT_MS)]
    pub count_query_timeout_ms: u64,

    /// Default log filter; `RUST_LOG` wins when set.
    #[arg(long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormatArg::Text
    )]
    pub log_format: LogFormatArg,
}

impl CLI {
    pub fn service_config(&self) -> ServiceConfig {
        let storage = StorageParameters::builder()
            .backend(self.storage.into())
            .add_query_timeout(Duration::from_millis(self.add_query_timeout_ms))
            .get_query_timeout(Duration::from_millis(self.get_query_timeout_ms))
            .count_query_timeout(Duration::from_millis(self.count_query_timeout_ms))
            .build();

        ServiceConfig {
            listen_addr: self.listen_addr,
            storage,
            mysql_dsn: self.mysql_dsn.clone(),
            mysql_password: self.mysql_password.clone(),
            mongo_uri: self.mongo_uri.clone(),
            mongo_database: self.mongo_database.clone(),
            limits: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = CLI::try_parse_from(["roster-user-server"]).unwrap();
        let config = cli.service_config();

        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.storage, StorageParameters::default());
        assert_eq!(cli.log_format, LogFormatArg::Text);
    }

    #[test]
    fn mysql_requires_dsn() {
        let result = CLI::try_parse_from(["roster-user-server", "--storage", "mysql"]);
        assert!(result.is_err());
    }

    #[test]
    fn mongo_settings() {
        let cli = CLI::try_parse_from([
            "roster-user-server",
            "--storage",
            "mongo",
            "--mongo-uri",
            "mongodb://localhost:27017",
            "--count-query-timeout-ms",
            "250",
        ])
        .unwrap();
        let config = cli.service_config();

        assert_eq!(config.storage.backend, StorageBackend::Mongo);
        assert_eq!(
            config.storage.count_query_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(config.mongo_database, DEFAULT_MONGO_DATABASE);
        assert!(config.validate().is_ok());
    }
}
