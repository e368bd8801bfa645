use crate::timeout::with_timeout;
use async_trait::async_trait;
use roster_core::{
    ensure_entity_id, ensure_user_id, Result, StorageBackend, StorageError, StorageParameters,
    Storer, UserEntity,
};
use sqlx::migrate::Migrator;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use std::str::FromStr;
use tracing::debug;

const USER_ID_COL: &str = "user_id";
const ENTITY_ID_COL: &str = "entity_id";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// MySQL implementation of the [`Storer`] contract.
///
/// All associations live in one `user_entity` table. Times are stored as
/// Unix microseconds. Reads and counts only see rows with `removed = FALSE`;
/// `get_entities` returns them in insertion order.
///
/// Uniqueness is checked with a count before the insert. The schema also
/// carries a unique key over active `(user_id, entity_id)` pairs, so two
/// racing inserts of the same pair cannot both land; the loser is reported as
/// [`StorageError::AssociationExists`]. Removed rows are outside that key and
/// never block re-adding a pair.
#[derive(Debug, Clone)]
pub struct MySqlStorer {
    pool: MySqlPool,
    params: StorageParameters,
}

impl MySqlStorer {
    /// Creates a storer from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool, params: StorageParameters) -> Self {
        Self { pool, params }
    }

    /// Creates a storer by opening a new MySQL connection pool.
    ///
    /// Fails with [`StorageError::Configuration`] before connecting if the
    /// URL is empty or `params` selects a different backend.
    pub async fn connect(database_url: &str, params: StorageParameters) -> Result<Self> {
        Self::connect_with_password(database_url, None, params).await
    }

    /// Like [`MySqlStorer::connect`], with the password kept out of the URL.
    ///
    /// A `password` given here replaces any password embedded in `database_url`.
    pub async fn connect_with_password(
        database_url: &str,
        password: Option<&str>,
        params: StorageParameters,
    ) -> Result<Self> {
        if database_url.is_empty() {
            return Err(StorageError::Configuration("empty database URL".to_string()));
        }
        if params.backend != StorageBackend::MySql {
            return Err(StorageError::Configuration(format!(
                "unexpected storage type: {}",
                params.backend
            )));
        }
        let mut options = MySqlConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::Configuration(format!("invalid database URL: {e}")))?;
        if let Some(password) = password {
            options = options.password(password);
        }

        let pool = MySqlPool::connect_with(options)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool, params))
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Operation(format!("failed to apply migrations: {e}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn count_where(
        &self,
        operation: &'static str,
        filters: &[(&'static str, &str)],
    ) -> Result<usize> {
        let mut query =
            QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM user_entity WHERE removed = FALSE");
        for (column, value) in filters {
            query.push(" AND ").push(*column).push(" = ").push_bind(*value);
        }

        let count = with_timeout(operation, self.params.count_query_timeout, async {
            query
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        usize::try_from(count)
            .map_err(|_| StorageError::InvalidData(format!("negative row count: {count}")))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Storer for MySqlStorer {
    async fn add_entity(&self, user_id: &str, entity_id: &str) -> Result<()> {
        ensure_user_id(user_id)?;
        ensure_entity_id(entity_id)?;

        let existing = self
            .count_where(
                "count user entities",
                &[(USER_ID_COL, user_id), (ENTITY_ID_COL, entity_id)],
            )
            .await?;
        if existing > 0 {
            return Err(StorageError::association_exists(user_id, entity_id));
        }

        let record = UserEntity::new(user_id, entity_id);
        let mut query = QueryBuilder::<MySql>::new(
            "INSERT INTO user_entity \
             (user_id, entity_id, removed, modified_date, modified_time, added_time, removed_time) ",
        );
        query.push_values(std::iter::once(record), |mut row, ue| {
            row.push_bind(ue.user_id)
                .push_bind(ue.entity_id)
                .push_bind(ue.removed)
                .push_bind(ue.modified_date)
                .push_bind(ue.modified_time.as_microsecond())
                .push_bind(ue.added_time.as_microsecond())
                .push_bind(ue.removed_time.map(|ts| ts.as_microsecond()));
        });

        debug!(user_id, entity_id, "adding entity");
        with_timeout("add entity", self.params.add_query_timeout, async {
            match query.build().execute(&self.pool).await {
                Ok(_) => Ok(()),
                Err(err) if is_unique_violation(&err) => {
                    Err(StorageError::association_exists(user_id, entity_id))
                }
                Err(err) => Err(map_sqlx_error(err)),
            }
        })
        .await?;

        debug!(user_id, entity_id, "added entity");
        Ok(())
    }

    async fn get_entities(&self, user_id: &str) -> Result<Vec<String>> {
        ensure_user_id(user_id)?;

        let mut query = QueryBuilder::<MySql>::new(
            "SELECT entity_id FROM user_entity WHERE removed = FALSE AND user_id = ",
        );
        query.push_bind(user_id).push(" ORDER BY id");
        debug!(user_id, sql = query.sql(), "getting entities");

        let entity_ids = with_timeout("get entities", self.params.get_query_timeout, async {
            query
                .build_query_scalar::<String>()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)
        })
        .await?;

        debug!(user_id, n_entities = entity_ids.len(), "got entities");
        Ok(entity_ids)
    }

    async fn count_entities(&self, user_id: &str) -> Result<usize> {
        ensure_user_id(user_id)?;
        let count = self
            .count_where("count entities", &[(USER_ID_COL, user_id)])
            .await?;
        debug!(user_id, count, "counted entities");
        Ok(count)
    }

    async fn count_users(&self, entity_id: &str) -> Result<usize> {
        ensure_entity_id(entity_id)?;
        let count = self
            .count_where("count users", &[(ENTITY_ID_COL, entity_id)])
            .await?;
        debug!(entity_id, count, "counted users");
        Ok(count)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
