use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Claims returned by the auth service's validate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedClaims {
    pub user_id: String,
    pub tenant_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[allow(dead_code)]
    valid: bool,
    user_id: String,
    tenant_id: String,
    email: Option<String>,
    roles: Vec<String>,
    permissions: Vec<String>,
}

/// HTTP client for the auth service's token validation endpoint.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validate a bearer token. `Ok(None)` means the auth service rejected
    /// it (401/403); transport failures surface as bad-gateway.
    pub async fn validate_token(
        &self,
        token: &str,
        tenant_header: Option<&str>,
    ) -> Result<Option<ValidatedClaims>, AppError> {
        let url = format!("{}/api/v1/auth/validate", self.base_url);

        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "token": token }));
        if let Some(tenant) = tenant_header {
            request = request.header("X-Tenant-ID", tenant);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Token validation call failed");
            AppError::BadGateway(format!("auth service unreachable: {}", e))
        })?;

        let status = response.status();
        if status.is_success() {
            let body: ValidateResponse = response.json().await.map_err(|e| {
                AppError::BadGateway(format!("invalid validation response: {}", e))
            })?;
            return Ok(Some(ValidatedClaims {
                user_id: body.user_id,
                tenant_id: body.tenant_id,
                email: body.email,
                roles: body.roles,
                permissions: body.permissions,
            }));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }

        Err(AppError::BadGateway(format!(
            "auth service returned {}",
            status
        )))
    }
}
