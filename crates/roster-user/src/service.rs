use crate::error::UserError;
use roster_core::{ensure_entity_id, ensure_user_id, Storer};
use std::sync::Arc;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

/// Maximum number of entities a single user may be associated with.
pub const MAX_USER_ENTITIES: usize = 16;

/// Maximum number of users a single entity may be associated with.
pub const MAX_ENTITY_USERS: usize = 256;

/// Association caps enforced before every add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct Limits {
    #[builder(default = MAX_USER_ENTITIES)]
    pub max_user_entities: usize,
    #[builder(default = MAX_ENTITY_USERS)]
    pub max_entity_users: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Request handling for the user service.
///
/// Wraps a [`Storer`] and applies, in order:
/// - ID validation
/// - the per-entity user cap
/// - the per-user entity cap
///
/// before handing the add to storage. The caps are checked with separate
/// count calls and are not atomic with the insert, so concurrent adds can
/// overshoot a cap by the number of racing requests.
pub struct EntityService<S> {
    storer: Arc<S>,
    limits: Limits,
}

impl<S> Clone for EntityService<S> {
    fn clone(&self) -> Self {
        Self {
            storer: Arc::clone(&self.storer),
            limits: self.limits,
        }
    }
}

impl<S: Storer> EntityService<S> {
    /// Creates a service over `storer` with the default caps.
    pub fn new(storer: S) -> Self {
        Self::from_arc(Arc::new(storer))
    }

    pub fn from_arc(storer: Arc<S>) -> Self {
        Self {
            storer,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// The storer this service writes to.
    pub fn storer(&self) -> &Arc<S> {
        &self.storer
    }

    /// Associates `entity_id` with `user_id`.
    ///
    /// Storage is not touched when validation fails, and nothing is added
    /// when either cap would be exceeded.
    pub async fn add_entity(&self, user_id: &str, entity_id: &str) -> Result<(), UserError> {
        ensure_user_id(user_id)?;
        ensure_entity_id(entity_id)?;
        debug!(user_id, entity_id, "received add entity request");

        let n_users = self.storer.count_users(entity_id).await?;
        if n_users + 1 > self.limits.max_entity_users {
            debug!(entity_id, n_users, "entity user cap reached");
            return Err(UserError::TooManyEntityUsers(entity_id.to_string()));
        }

        let n_entities = self.storer.count_entities(user_id).await?;
        if n_entities + 1 > self.limits.max_user_entities {
            debug!(user_id, n_entities, "user entity cap reached");
            return Err(UserError::TooManyUserEntities(user_id.to_string()));
        }

        self.storer.add_entity(user_id, entity_id).await?;

        info!(user_id, entity_id, "added entity to user");
        Ok(())
    }

    /// Returns the entity IDs associated with `user_id`.
    pub async fn get_entities(&self, user_id: &str) -> Result<Vec<String>, UserError> {
        ensure_user_id(user_id)?;
        debug!(user_id, "received get entities request");

        let entity_ids = self.storer.get_entities(user_id).await?;

        info!(
            user_id,
            n_entities = entity_ids.len(),
            "got entities for user"
        );
        Ok(entity_ids)
    }
}
