use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::IdentifierKind;

/// Per-tenant login policy: which identifier kinds are accepted, what a
/// password must look like, session lifetime, and lockout parameters.
///
/// A tenant without a stored row gets [`TenantLoginConfig::default_for`];
/// config lookup never fails with not-found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantLoginConfig {
    pub tenant_id: String,
    pub allowed_identifiers: Vec<IdentifierKind>,
    pub require_2fa: bool,
    pub allow_registration: bool,
    pub password_min_length: usize,
    pub password_require_upper: bool,
    pub password_require_lower: bool,
    pub password_require_digit: bool,
    pub password_require_special: bool,
    pub session_timeout_minutes: u64,
    pub max_login_attempts: u64,
    pub lockout_duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_background_url: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields: HashMap<String, String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl TenantLoginConfig {
    /// Sentinel returned when a tenant has no stored config.
    pub fn default_for(tenant_id: &str) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: tenant_id.to_string(),
            allowed_identifiers: vec![IdentifierKind::Email, IdentifierKind::Username],
            require_2fa: false,
            allow_registration: true,
            password_min_length: 8,
            password_require_upper: true,
            password_require_lower: true,
            password_require_digit: true,
            password_require_special: false,
            session_timeout_minutes: 1440,
            max_login_attempts: 5,
            lockout_duration_minutes: 30,
            custom_logo_url: None,
            custom_background_url: None,
            custom_fields: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_identifier_allowed(&self, kind: IdentifierKind) -> bool {
        self.allowed_identifiers.contains(&kind)
    }

    pub fn session_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_timeout_minutes * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_email_and_username_only() {
        let config = TenantLoginConfig::default_for("acme");
        assert!(config.is_identifier_allowed(IdentifierKind::Email));
        assert!(config.is_identifier_allowed(IdentifierKind::Username));
        assert!(!config.is_identifier_allowed(IdentifierKind::Phone));
        assert!(!config.is_identifier_allowed(IdentifierKind::DocNumber));
    }

    #[test]
    fn default_lockout_parameters() {
        let config = TenantLoginConfig::default_for("acme");
        assert_eq!(config.max_login_attempts, 5);
        assert_eq!(config.lockout_duration_minutes, 30);
        assert_eq!(config.session_timeout(), std::time::Duration::from_secs(86400));
    }
}
