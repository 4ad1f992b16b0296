use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The blob stored in the session store under an opaque access token.
///
/// Lives only in Redis (as JSON), never in MongoDB, so timestamps use
/// plain chrono serialization. `expires_at` mirrors the store TTL and is
/// checked explicitly on every validation; the TTL is the janitor, this
/// field is the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub tenant_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: String,
        tenant_id: String,
        email: String,
        roles: Vec<String>,
        ttl: std::time::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            tenant_id,
            email,
            roles,
            created_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::hours(24)),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Key under which this session lives in the store.
    pub fn key(access_token: &str) -> String {
        format!("session:{}", access_token)
    }
}
