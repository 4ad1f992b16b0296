use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-bounded forbidden state for a (user, tenant) pair.
///
/// While an active row with `unlock_at` in the future exists, every login
/// attempt for that pair fails with `locked` before the password is even
/// looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLockout {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub locked_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub unlock_at: DateTime<Utc>,
    pub reason: String,
    pub is_active: bool,
    #[serde(default, with = "super::bson_datetime_option")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserLockout {
    pub fn new(
        user_id: String,
        tenant_id: String,
        duration_minutes: i64,
        reason: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            tenant_id,
            locked_at: now,
            unlock_at: now + Duration::minutes(duration_minutes),
            reason,
            is_active: true,
            released_at: None,
            created_at: now,
        }
    }

    pub fn is_in_effect(&self) -> bool {
        self.is_active && self.unlock_at > Utc::now()
    }

    pub fn remaining_seconds(&self) -> i64 {
        (self.unlock_at - Utc::now()).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lockout_is_in_effect_until_unlock_at() {
        let lockout = UserLockout::new("u1".to_string(), "t1".to_string(), 15, "failed logins".to_string());
        assert!(lockout.is_in_effect());
        assert!(lockout.remaining_seconds() > 0);
        assert!(lockout.remaining_seconds() <= 15 * 60);
    }

    #[test]
    fn past_unlock_at_means_not_in_effect() {
        let mut lockout =
            UserLockout::new("u1".to_string(), "t1".to_string(), 15, "failed logins".to_string());
        lockout.unlock_at = Utc::now() - Duration::seconds(1);
        assert!(!lockout.is_in_effect());
        assert_eq!(lockout.remaining_seconds(), 0);
    }
}
