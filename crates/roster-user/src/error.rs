use roster_core::{StorageError, ValidationError};
use thiserror::Error;
use tonic::{Code, Status};

/// Errors returned by [`EntityService`](crate::EntityService).
///
/// Storage errors are wrapped as-is; their message and classification reach
/// the caller unchanged.
#[derive(Debug, Clone, Error)]
pub enum UserError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("too many associated entities for user ID {0}")]
    TooManyUserEntities(String),
    #[error("too many associated users for entity ID {0}")]
    TooManyEntityUsers(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn storage_code(error: &StorageError) -> Code {
    match error {
        StorageError::Validation(_) => Code::InvalidArgument,
        StorageError::AssociationExists { .. } => Code::AlreadyExists,
        StorageError::Timeout(_) => Code::DeadlineExceeded,
        StorageError::Unavailable(_) => Code::Unavailable,
        StorageError::InvalidData(_) => Code::DataLoss,
        StorageError::Query(_) | StorageError::Configuration(_) | StorageError::Operation(_) => {
            Code::Internal
        }
    }
}

impl From<UserError> for Status {
    fn from(error: UserError) -> Self {
        let code = match &error {
            UserError::Validation(_) => Code::InvalidArgument,
            UserError::TooManyUserEntities(_) | UserError::TooManyEntityUsers(_) => {
                Code::FailedPrecondition
            }
            UserError::Storage(source) => storage_code(source),
        };
        Status::new(code, error.to_string())
    }
}
