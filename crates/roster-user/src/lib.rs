//! User service: associates user IDs with entity IDs over gRPC.
//!
//! [`EntityService`] holds the request-handling rules (validation and the
//! per-user / per-entity caps) on top of any [`Storer`](roster_core::Storer).
//! [`UserGrpcServer`] exposes it as the `user.v1.UserService` gRPC service and
//! [`server::serve`] wires the configured backend, health reporting and
//! graceful shutdown together.

pub mod config;
pub mod error;
pub mod grpc;
pub mod server;
pub mod service;
pub mod telemetry;

pub use config::{ConfigError, ServiceConfig};
pub use error::UserError;
pub use grpc::UserGrpcServer;
pub use service::{EntityService, Limits, MAX_ENTITY_USERS, MAX_USER_ENTITIES};
