//! Test infrastructure shared by the Roster crates.
//!
//! - [`mysql::MySqlServer`] and [`mongo::MongoServer`] start disposable
//!   database containers, hand out ready connections and can write raw
//!   association rows that bypass a storer;
//! - [`conformance`] holds the behaviour every [`Storer`](roster_core::Storer)
//!   backend must show, written once and run against each backend.

pub mod conformance;
mod container;
pub mod error;
pub mod mongo;
pub mod mysql;

pub use error::{Result, TestInfraError};
