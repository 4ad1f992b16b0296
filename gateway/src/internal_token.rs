use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::services::ValidatedClaims;

/// Claims minted by the gateway after validating a bearer. Downstream
/// services verify the signature statelessly and must not go back to the
/// session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalClaims {
    pub sub: String,
    pub tenant_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs the short-lived internal tokens that carry validated claims to
/// downstream services.
#[derive(Clone)]
pub struct InternalTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl InternalTokenSigner {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }

    pub fn mint(&self, claims: &ValidatedClaims) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let internal = InternalClaims {
            sub: claims.user_id.clone(),
            tenant_id: claims.tenant_id.clone(),
            email: claims.email.clone(),
            roles: claims.roles.clone(),
            permissions: claims.permissions.clone(),
            token_type: "internal".to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &internal, &self.encoding_key).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to mint internal token: {}", e))
        })
    }

    /// Verification path downstream services use; exercised here by tests.
    pub fn verify(&self, token: &str) -> Result<InternalClaims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<InternalClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::invalid_token())?;
        if data.claims.token_type != "internal" {
            return Err(AppError::invalid_token());
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> ValidatedClaims {
        ValidatedClaims {
            user_id: "u1".to_string(),
            tenant_id: "t1".to_string(),
            email: Some("a@b.c".to_string()),
            roles: vec!["admin".to_string()],
            permissions: vec!["user.*".to_string()],
        }
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let signer = InternalTokenSigner::new("internal-secret", 300);
        let token = signer.mint(&claims()).unwrap();
        let decoded = signer.verify(&token).unwrap();
        assert_eq!(decoded.sub, "u1");
        assert_eq!(decoded.tenant_id, "t1");
        assert_eq!(decoded.permissions, vec!["user.*".to_string()]);
        assert!(decoded.exp - decoded.iat == 300);
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let signer = InternalTokenSigner::new("internal-secret", 300);
        let other = InternalTokenSigner::new("different-secret", 300);
        let token = signer.mint(&claims()).unwrap();
        assert!(other.verify(&token).is_err());
    }
}
