use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A malformed request: one of the identifiers is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("empty user ID field")]
    EmptyUserId,
    #[error("empty entity ID field")]
    EmptyEntityId,
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user-entity association already exists: ({user_id}, {entity_id})")]
    AssociationExists { user_id: String, entity_id: String },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage misconfigured: {0}")]
    Configuration(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    pub fn association_exists(user_id: &str, entity_id: &str) -> Self {
        Self::AssociationExists {
            user_id: user_id.to_owned(),
            entity_id: entity_id.to_owned(),
        }
    }
}

/// Rejects an empty user ID.
pub fn ensure_user_id(user_id: &str) -> std::result::Result<(), ValidationError> {
    if user_id.is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    Ok(())
}

/// Rejects an empty entity ID.
pub fn ensure_entity_id(entity_id: &str) -> std::result::Result<(), ValidationError> {
    if entity_id.is_empty() {
        return Err(ValidationError::EmptyEntityId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ids_are_rejected() {
        assert_eq!(ensure_user_id(""), Err(ValidationError::EmptyUserId));
        assert_eq!(ensure_entity_id(""), Err(ValidationError::EmptyEntityId));
    }

    #[test]
    fn non_empty_ids_pass() {
        assert!(ensure_user_id("User-0").is_ok());
        assert!(ensure_entity_id("Entity-0").is_ok());
    }

    #[test]
    fn validation_errors_display_through_storage_error() {
        let err: StorageError = ValidationError::EmptyEntityId.into();
        assert_eq!(err.to_string(), "empty entity ID field");
    }
}
