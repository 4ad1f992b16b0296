use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named bundle of permission strings.
///
/// `tenant_id = None` marks a system-wide role visible to every tenant; a
/// permission lookup for a membership considers roles whose tenant matches
/// or is unset. (`name`, `tenant_id`) is unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// System roles are seeded at deploy time and cannot be deleted.
    #[serde(default)]
    pub is_system: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(name: String, tenant_id: Option<String>, permissions: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description: String::new(),
            permissions,
            tenant_id,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }
}
