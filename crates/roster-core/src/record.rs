use jiff::Timestamp;
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

/// A stored (user ID, entity ID) association.
///
/// `removed` and `removed_time` are carried for schema compatibility with
/// the persisted layouts. No exposed operation sets them, but every read
/// filters on `removed == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntity {
    pub user_id: String,
    pub entity_id: String,
    pub removed: bool,
    /// Whole days since the Unix epoch at the last modification.
    pub modified_date: i32,
    pub modified_time: Timestamp,
    pub added_time: Timestamp,
    pub removed_time: Option<Timestamp>,
}

impl UserEntity {
    /// Creates a new active association stamped with the current time.
    pub fn new(user_id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::added_at(user_id, entity_id, Timestamp::now())
    }

    /// Creates a new active association stamped with the given time.
    pub fn added_at(
        user_id: impl Into<String>,
        entity_id: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            entity_id: entity_id.into(),
            removed: false,
            modified_date: day_of(now),
            modified_time: now,
            added_time: now,
            removed_time: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }

    /// Returns `true` if this is an active association between the two IDs.
    pub fn links(&self, user_id: &str, entity_id: &str) -> bool {
        self.is_active() && self.user_id == user_id && self.entity_id == entity_id
    }
}

/// Day-granularity date used for `modified_date`.
pub fn day_of(ts: Timestamp) -> i32 {
    let days = ts.as_second().div_euclid(SECONDS_PER_DAY);
    i32::try_from(days).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_active_with_matching_times() {
        let now = Timestamp::from_second(1_700_000_000).unwrap();
        let ue = UserEntity::added_at("User-0", "Entity-0", now);

        assert!(ue.is_active());
        assert_eq!(ue.added_time, now);
        assert_eq!(ue.modified_time, now);
        assert_eq!(ue.removed_time, None);
        assert_eq!(ue.modified_date, 19_675);
    }

    #[test]
    fn day_of_epoch_boundaries() {
        assert_eq!(day_of(Timestamp::UNIX_EPOCH), 0);
        assert_eq!(day_of(Timestamp::from_second(86_399).unwrap()), 0);
        assert_eq!(day_of(Timestamp::from_second(86_400).unwrap()), 1);
        assert_eq!(day_of(Timestamp::from_second(-1).unwrap()), -1);
    }

    #[test]
    fn links_ignores_removed_records() {
        let mut ue = UserEntity::new("u", "e");
        assert!(ue.links("u", "e"));
        assert!(!ue.links("u", "other"));

        ue.removed = true;
        assert!(!ue.links("u", "e"));
    }
}
