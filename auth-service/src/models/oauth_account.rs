use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(format!("Unknown OAuth provider: {}", other)),
        }
    }
}

/// Link between an external identity and a local user.
///
/// (`provider`, `provider_id`) is unique and points to at most one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthAccount {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub provider: OAuthProvider,
    pub provider_id: String,
    pub email: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl OAuthAccount {
    pub fn new(user_id: String, provider: OAuthProvider, provider_id: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            provider,
            provider_id,
            email,
            created_at: now,
            updated_at: now,
        }
    }
}
