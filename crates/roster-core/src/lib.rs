//! Core types and traits for the Roster user service.
//!
//! This crate provides the association record, the [`Storer`] contract every
//! storage backend implements, and the error taxonomy shared by the backends
//! and the request handler.

pub mod error;
pub mod params;
pub mod record;
pub mod storer;

pub use error::{ensure_entity_id, ensure_user_id, Result, StorageError, ValidationError};
pub use params::{StorageBackend, StorageParameters};
pub use record::UserEntity;
pub use storer::Storer;
