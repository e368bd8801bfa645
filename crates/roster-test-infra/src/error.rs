use thiserror::Error;

/// Errors raised while starting or talking to a test database.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
    #[error("mysql fixture error: {0}")]
    MySql(#[from] sqlx::Error),
    #[error("mongo fixture error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
