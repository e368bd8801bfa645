use crate::config::{ConfigError, ServiceConfig};
use crate::grpc::UserGrpcServer;
use crate::service::EntityService;
use roster_core::{StorageBackend, StorageError, Storer};
use roster_proto_schema::v1::user_service_server::UserServiceServer;
use roster_storage::{InMemoryStorer, MongoStorer, MySqlStorer};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tonic::transport::Server;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

/// Runs the user gRPC server until `shutdown` resolves.
///
/// Opens the configured backend (applying MySQL migrations or MongoDB
/// indexes first), serves `user.v1.UserService` plus the standard gRPC
/// health service on `config.listen_addr`, and closes the storer once the
/// server has drained.
pub async fn serve<F>(config: ServiceConfig, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage.backend,
        max_user_entities = config.limits.max_user_entities,
        max_entity_users = config.limits.max_entity_users,
        "starting user gRPC server"
    );

    match config.storage.backend {
        StorageBackend::Memory => run(&config, InMemoryStorer::new(), shutdown).await,
        StorageBackend::MySql => {
            let storer = MySqlStorer::connect_with_password(
                config.mysql_dsn()?,
                config.mysql_password.as_deref(),
                config.storage.clone(),
            )
            .await?;
            let migrated = storer.migrate().await;
            close_on_error(&storer, migrated).await?;
            run(&config, storer, shutdown).await
        }
        StorageBackend::Mongo => {
            let storer = MongoStorer::connect(
                config.mongo_uri()?,
                &config.mongo_database,
                config.storage.clone(),
            )
            .await?;
            run(&config, storer, shutdown).await
        }
    }
}

/// Closes `storer` when a setup step failed, so no connection outlives the
/// failed startup.
async fn close_on_error<S: Storer, T>(
    storer: &S,
    result: Result<T, StorageError>,
) -> Result<T, ServeError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(close_err) = storer.close().await {
                warn!(error = %close_err, "failed to close storage after setup error");
            }
            Err(err.into())
        }
    }
}

async fn run<S, F>(config: &ServiceConfig, storer: S, shutdown: F) -> Result<(), ServeError>
where
    S: Storer,
    F: Future<Output = ()>,
{
    let service = EntityService::new(storer).with_limits(config.limits);
    let storer = Arc::clone(service.storer());

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<UserServiceServer<UserGrpcServer<S>>>()
        .await;

    let served = Server::builder()
        .add_service(health_service)
        .add_service(UserServiceServer::new(UserGrpcServer::new(service)))
        .serve_with_shutdown(config.listen_addr, shutdown)
        .await;

    info!("user gRPC server stopped, closing storage");
    let closed = storer.close().await;
    if let Err(err) = &closed {
        warn!(error = %err, "failed to close storage");
    }

    served?;
    closed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ClosableStorer {
        closed: AtomicUsize,
    }

    #[async_trait]
    impl Storer for ClosableStorer {
        async fn add_entity(&self, _user_id: &str, _entity_id: &str) -> roster_core::Result<()> {
            Ok(())
        }

        async fn get_entities(&self, _user_id: &str) -> roster_core::Result<Vec<String>> {
            Ok(vec![])
        }

        async fn count_entities(&self, _user_id: &str) -> roster_core::Result<usize> {
            Ok(0)
        }

        async fn count_users(&self, _entity_id: &str) -> roster_core::Result<usize> {
            Ok(0)
        }

        async fn close(&self) -> roster_core::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_setup_closes_storage() {
        let storer = ClosableStorer::default();
        let failed: Result<(), StorageError> =
            Err(StorageError::Operation("failed to apply migrations".to_string()));

        let err = close_on_error(&storer, failed).await.unwrap_err();

        assert!(matches!(err, ServeError::Storage(StorageError::Operation(_))));
        assert_eq!(storer.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_setup_keeps_storage_open() {
        let storer = ClosableStorer::default();

        close_on_error(&storer, Ok(())).await.unwrap();

        assert_eq!(storer.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_dsn_fails_before_serving() {
        let config = ServiceConfig::builder()
            .storage(
                roster_core::StorageParameters::builder()
                    .backend(StorageBackend::MySql)
                    .build(),
            )
            .build();

        let err = serve(config, async {}).await.unwrap_err();
        assert!(matches!(err, ServeError::Config(ConfigError::MissingMysqlDsn)));
    }
}
