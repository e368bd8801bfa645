use crate::service::Limits;
use roster_core::{StorageBackend, StorageParameters};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;
use typed_builder::TypedBuilder;

pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 50051));
pub const DEFAULT_MONGO_DATABASE: &str = "roster";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("mysql dsn is required when storage backend is mysql")]
    MissingMysqlDsn,
    #[error("mongo uri is required when storage backend is mongo")]
    MissingMongoUri,
    #[error("mongo database is required when storage backend is mongo")]
    MissingMongoDatabase,
}

/// Everything the server needs to start.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    #[builder(default = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,
    #[builder(default)]
    pub storage: StorageParameters,
    #[builder(default, setter(strip_option, into))]
    pub mysql_dsn: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub mysql_password: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub mongo_uri: Option<String>,
    #[builder(default = DEFAULT_MONGO_DATABASE.to_string(), setter(into))]
    pub mongo_database: String,
    #[builder(default)]
    pub limits: Limits,
}

impl ServiceConfig {
    /// Checks that the selected backend has the connection settings it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend {
            StorageBackend::Memory => Ok(()),
            StorageBackend::MySql => self.mysql_dsn().map(|_| ()),
            StorageBackend::Mongo => self.mongo_uri().map(|_| ()),
        }
    }

    pub fn mysql_dsn(&self) -> Result<&str, ConfigError> {
        non_empty(self.mysql_dsn.as_deref()).ok_or(ConfigError::MissingMysqlDsn)
    }

    pub fn mongo_uri(&self) -> Result<&str, ConfigError> {
        let uri = non_empty(self.mongo_uri.as_deref()).ok_or(ConfigError::MissingMongoUri)?;
        if self.mongo_database.is_empty() {
            return Err(ConfigError::MissingMongoDatabase);
        }
        Ok(uri)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
