use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit row for a login attempt. A TTL index expires rows
/// after 24 hours; lockout accounting only ever looks at a much shorter
/// trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    #[serde(rename = "_id")]
    pub id: String,
    pub identifier: String,
    pub tenant_id: String,
    pub ip_address: String,
    pub success: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub attempt_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(identifier: String, tenant_id: String, ip_address: String, success: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            identifier,
            tenant_id,
            ip_address,
            success,
            attempt_at: Utc::now(),
        }
    }
}
