use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Default per-call timeout for every query kind.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// The storage medium backing a running service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StorageBackend {
    #[default]
    Memory,
    MySql,
    Mongo,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::MySql => write!(f, "mysql"),
            StorageBackend::Mongo => write!(f, "mongo"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StorageBackend::Memory),
            "mysql" => Ok(StorageBackend::MySql),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            other => Err(format!("invalid storage type: {other}")),
        }
    }
}

/// Parameters shared by every [`Storer`](crate::Storer) backend.
///
/// Each timeout bounds a single backend call of that kind; it is never
/// shared across the steps of a request.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct StorageParameters {
    #[builder(default)]
    pub backend: StorageBackend,
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub add_query_timeout: Duration,
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub get_query_timeout: Duration,
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub count_query_timeout: Duration,
}

impl Default for StorageParameters {
    fn default() -> Self {
        Self::builder().build()
    }
}
