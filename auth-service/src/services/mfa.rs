use async_trait::async_trait;
use service_core::error::AppError;

/// Second-factor verification seam.
///
/// TOTP enrollment and code checking live in an external collaborator; the
/// login machine only needs a yes/no for (user, tenant, code) between the
/// password check and authorization.
#[async_trait]
pub trait MfaVerifier: Send + Sync {
    async fn verify(&self, user_id: &str, tenant_id: &str, code: &str) -> Result<bool, AppError>;
}

/// Development/test verifier accepting a fixed code.
pub struct StaticMfaVerifier {
    code: String,
}

impl StaticMfaVerifier {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl Default for StaticMfaVerifier {
    fn default() -> Self {
        Self::new("000000")
    }
}

#[async_trait]
impl MfaVerifier for StaticMfaVerifier {
    async fn verify(&self, _user_id: &str, _tenant_id: &str, code: &str) -> Result<bool, AppError> {
        Ok(code == self.code)
    }
}
