use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authentication record for a user.
///
/// Identifiers are global: each non-empty one is unique across the whole
/// store, independent of tenant. Tenant access is granted exclusively
/// through [`super::Membership`] rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_number: Option<String>,
    /// Argon2 PHC string. Empty for OAuth-only accounts, which can never
    /// pass a password check. Reads outside the login path project this
    /// field away and decode into the default.
    #[serde(default)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_verified: bool,
    #[serde(default, with = "super::bson_datetime_option")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: Option<String>,
        username: Option<String>,
        phone: Option<String>,
        doc_number: Option<String>,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize(email),
            username: normalize(username),
            phone: normalize(phone),
            doc_number: normalize(doc_number),
            password_hash,
            is_active: true,
            is_verified: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// At least one identifier must be present at creation.
    pub fn has_identifier(&self) -> bool {
        self.email.is_some()
            || self.username.is_some()
            || self.phone.is_some()
            || self.doc_number.is_some()
    }

    /// All identifiers the user actually carries, in detection order.
    pub fn identifiers(&self) -> Vec<&str> {
        [&self.email, &self.username, &self.phone, &self.doc_number]
            .into_iter()
            .filter_map(|f| f.as_deref())
            .collect()
    }
}

/// Empty strings from request payloads are treated as absent.
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
