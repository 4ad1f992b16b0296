use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authoritative record that a user may act within a tenant.
///
/// At most one active row exists per (user_id, tenant_id); without one the
/// user has zero access to the tenant no matter how valid their credentials
/// are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: String, tenant_id: String, roles: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            tenant_id,
            roles,
            is_active: true,
            joined_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}
