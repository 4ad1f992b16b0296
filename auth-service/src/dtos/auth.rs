use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{IdentifierKind, Membership, TenantLoginConfig};

/// Registration payload. At least one identifier must be present; the
/// handler rejects the request otherwise, and the password policy of the
/// target tenant is enforced in the service layer.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: Option<String>,

    pub phone: Option<String>,

    pub doc_number: Option<String>,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(min = 1, message = "Tenant is required"))]
    pub tenant_id: String,

    pub roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Identifier is required"))]
    pub identifier: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[validate(length(min = 1, message = "Tenant is required"))]
    pub tenant_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MfaCompleteRequest {
    #[validate(length(min = 1, message = "MFA token is required"))]
    pub mfa_token: String,

    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
}

/// Returned instead of a token pair when the tenant requires a second
/// factor.
#[derive(Debug, Serialize)]
pub struct MfaRequiredResponse {
    pub mfa_required: bool,
    pub mfa_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ValidateRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Claims handed to the gateway and sibling services after validation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub user_id: String,
    pub tenant_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Post-exchange OAuth contract: the provider handshake happens elsewhere,
/// the core receives the proven identity.
#[derive(Debug, Deserialize, Validate)]
pub struct OAuthLoginRequest {
    #[validate(length(min = 1, message = "Provider is required"))]
    pub provider: String,

    #[validate(length(min = 1, message = "Provider account id is required"))]
    pub provider_id: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Tenant is required"))]
    pub tenant_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Old password is required"))]
    pub old_password: String,

    #[validate(length(min = 1, message = "New password is required"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub joined_at: DateTime<Utc>,
}

impl From<Membership> for MembershipResponse {
    fn from(m: Membership) -> Self {
        Self {
            tenant_id: m.tenant_id,
            roles: m.roles,
            joined_at: m.joined_at,
        }
    }
}

/// Public subset of a tenant's login config, enough for a login UI to
/// render itself. Policy internals (lockout thresholds) stay private.
#[derive(Debug, Serialize)]
pub struct LoginConfigResponse {
    pub tenant_id: String,
    pub allowed_identifiers: Vec<IdentifierKind>,
    pub allow_registration: bool,
    pub require_2fa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_logo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_background_url: Option<String>,
}

impl From<TenantLoginConfig> for LoginConfigResponse {
    fn from(c: TenantLoginConfig) -> Self {
        Self {
            tenant_id: c.tenant_id,
            allowed_identifiers: c.allowed_identifiers,
            allow_registration: c.allow_registration,
            require_2fa: c.require_2fa,
            custom_logo_url: c.custom_logo_url,
            custom_background_url: c.custom_background_url,
        }
    }
}
