use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persistent record backing a signed refresh token.
///
/// The signature proves the token was minted here; this row is what makes
/// revocation authoritative. A credential is valid iff `revoked_at` is null
/// and `expires_at` is in the future, and the storage layer enforces that
/// predicate on lookup regardless of TTL-cleanup lag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshCredential {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    pub token: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "super::bson_datetime_option")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshCredential {
    pub fn new(
        user_id: String,
        tenant_id: String,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            tenant_id,
            token,
            expires_at,
            created_at: Utc::now(),
            revoked_at: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.revoked_at.is_none() && self.expires_at > Utc::now()
    }
}
