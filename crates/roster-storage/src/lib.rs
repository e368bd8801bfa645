//! Storage backends for the Roster user service.
//!
//! Three interchangeable [`Storer`] implementations are provided:
//!
//! - [`InMemoryStorer`]: a lock-guarded list, for tests and single-node use;
//! - [`MySqlStorer`]: a relational backend over a `user_entity` table;
//! - [`MongoStorer`]: a document-store backend over a `user_entity` collection.
//!
//! The backend is chosen once at service construction; nothing here migrates
//! or replicates data between backends.

pub mod memory;
pub mod mongo;
pub mod mysql;
mod timeout;

pub use memory::InMemoryStorer;
pub use mongo::MongoStorer;
pub use mysql::MySqlStorer;
pub use roster_core::{Result, StorageError, StorageParameters, Storer};
