use crate::container::{retry, ServiceContainer};
use crate::Result;
use roster_core::UserEntity;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{GenericImage, ImageExt};
use typed_builder::TypedBuilder;

const MYSQL_PORT: u16 = 3306;
const CONNECT_ATTEMPTS: usize = 20;
const CONNECT_DELAY: Duration = Duration::from_millis(500);

#[derive(TypedBuilder)]
pub struct MysqlConfig {
    #[builder(default = "8.4".to_string())]
    tag: String,
    #[builder(default = "roster".to_string())]
    database: String,
    #[builder(default = "roster".to_string())]
    username: String,
    #[builder(default = "roster".to_string())]
    password: String,
}

/// Disposable MySQL server holding a `roster` database.
pub struct MySqlServer {
    service: ServiceContainer,
    config: MysqlConfig,
}

impl MySqlServer {
    pub async fn new(config: MysqlConfig) -> Result<Self> {
        let container = GenericImage::new("mysql", config.tag.as_str())
            .with_exposed_port(MYSQL_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr("ready for connections"))
            .with_env_var("MYSQL_DATABASE", config.database.as_str())
            .with_env_var("MYSQL_USER", config.username.as_str())
            .with_env_var("MYSQL_PASSWORD", config.password.as_str())
            .with_env_var("MYSQL_ROOT_PASSWORD", "root")
            .start()
            .await?;

        Ok(Self {
            service: ServiceContainer::new(container, MYSQL_PORT),
            config,
        })
    }

    pub async fn database_url(&self) -> Result<String> {
        let (host, port) = self.service.address().await?;
        Ok(format!(
            "mysql://{}:{}@{host}:{port}/{}",
            self.config.username, self.config.password, self.config.database
        ))
    }

    /// Opens a pool once the server accepts connections.
    pub async fn connect(&self) -> Result<MySqlPool> {
        let url = self.database_url().await?;
        let url = url.as_str();
        let pool = retry(CONNECT_ATTEMPTS, CONNECT_DELAY, || {
            MySqlPoolOptions::new().max_connections(5).connect(url)
        })
        .await?;
        Ok(pool)
    }
}

/// Writes `record` into the `user_entity` table as-is, skipping every storer
/// check. The schema must already be migrated.
pub async fn insert_user_entity(pool: &MySqlPool, record: &UserEntity) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_entity
            (user_id, entity_id, removed, modified_date, modified_time, added_time, removed_time)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.user_id.as_str())
    .bind(record.entity_id.as_str())
    .bind(record.removed)
    .bind(record.modified_date)
    .bind(record.modified_time.as_microsecond())
    .bind(record.added_time.as_microsecond())
    .bind(record.removed_time.map(|ts| ts.as_microsecond()))
    .execute(pool)
    .await?;
    Ok(())
}
