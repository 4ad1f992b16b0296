use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::{AppError, ForbiddenReason};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{RefreshCredential, Session, User};
use crate::services::{Cache, CredentialStore, PermissionService};

/// MFA continuation tokens are only meant to bridge the gap between a
/// password check and the second factor.
const MFA_TOKEN_TTL_MINUTES: i64 = 5;

/// Issues and validates the dual-token pair: an opaque access token whose
/// authority is the session-store entry under it, and a signed refresh
/// token backed by a revocation-aware credential row.
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<dyn Cache>,
    permissions: Arc<PermissionService>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_default: Duration,
    refresh_ttl_days: i64,
}

/// Claims carried by a signed refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User id.
    pub sub: String,
    pub tenant_id: String,
    /// Always "refresh"; an access or MFA token must never pass here.
    pub token_type: String,
    /// Unique per token so a rotation always yields a different string.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by the short-lived MFA continuation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaClaims {
    pub sub: String,
    pub tenant_id: String,
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// The stable wire shape returned by login, register and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: Option<String>,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

/// Result of validating an access token, including resolved permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedToken {
    pub user_id: String,
    pub tenant_id: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl TokenService {
    pub fn new(
        config: &JwtConfig,
        store: Arc<dyn CredentialStore>,
        sessions: Arc<dyn Cache>,
        permissions: Arc<PermissionService>,
    ) -> Self {
        Self {
            store,
            sessions,
            permissions,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl_default: Duration::from_secs(config.access_ttl_minutes * 60),
            refresh_ttl_days: config.refresh_ttl_days,
        }
    }

    /// Session lifetime for a tenant, falling back to the service-wide
    /// default when the tenant config carries none.
    pub fn session_ttl(&self, config: &crate::models::TenantLoginConfig) -> Duration {
        if config.session_timeout_minutes == 0 {
            self.access_ttl_default
        } else {
            config.session_timeout()
        }
    }

    /// Issue an access/refresh pair. The session write and the refresh
    /// credential write run concurrently; a failed session write is fatal
    /// (the access token would be meaningless), a failed credential write
    /// only costs the user a re-login when they try to refresh.
    pub async fn generate_token_pair(
        &self,
        user: &User,
        tenant_id: &str,
        roles: &[String],
        session_ttl: Duration,
    ) -> Result<TokenPair, AppError> {
        let (access_token, session, refresh_token, credential) =
            self.mint_pair(user, tenant_id, roles, session_ttl)?;

        let session_bytes = serde_json::to_vec(&session)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode session: {}", e)))?;

        let session_key = Session::key(&access_token);
        let (session_write, credential_write) = tokio::join!(
            self.sessions
                .set(&session_key, session_bytes, session_ttl),
            self.store.create_refresh_credential(&credential),
        );

        session_write.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to create session: {}", e))
        })?;
        if let Err(e) = credential_write {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to store refresh credential");
        }

        Ok(self.pair_response(access_token, refresh_token, user, tenant_id, roles, session_ttl))
    }

    /// Validate an opaque access token: session lookup, expiry, then a
    /// recheck that the user is still active and the membership still
    /// stands. A revoked membership fails immediately, live session or not.
    pub async fn verify_token(&self, access_token: &str) -> Result<ValidatedToken, AppError> {
        let key = Session::key(access_token);
        let bytes = self
            .sessions
            .get(&key)
            .await?
            .ok_or_else(AppError::invalid_token)?;
        let session: Session = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Corrupt session blob: {}", e)))?;

        if session.is_expired() {
            let _ = self.sessions.delete(&key).await;
            return Err(AppError::invalid_token());
        }

        let user = self
            .store
            .find_user_by_id(&session.user_id)
            .await?
            .ok_or_else(AppError::invalid_token)?;
        if !user.is_active {
            return Err(ForbiddenReason::AccountDeactivated.into());
        }

        let membership = self
            .store
            .find_membership(&session.user_id, &session.tenant_id)
            .await?;
        match membership {
            Some(m) if m.is_active => {}
            _ => return Err(ForbiddenReason::NoTenantAccess.into()),
        }

        let permissions = self
            .permissions
            .get_user_permissions(&session.user_id, &session.tenant_id)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to resolve permissions during validation");
                Vec::new()
            });

        Ok(ValidatedToken {
            user_id: session.user_id,
            tenant_id: session.tenant_id,
            email: Some(session.email).filter(|e| !e.is_empty()),
            roles: session.roles,
            permissions,
        })
    }

    /// Rotate a refresh token. The presented token must pass both the
    /// signature/expiry check and the store's validity predicate; rotation
    /// renders it unusable, so a replay fails with `unauthenticated`.
    ///
    /// Without multi-document transactions the write order is: new
    /// credential, new session, then revoke the old credential. A crash in
    /// between leaves at worst one replayable old token, bounded by its
    /// expiry.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let claims = self.decode_refresh(refresh_token)?;

        let credential = self
            .store
            .find_refresh_credential(refresh_token)
            .await?
            .ok_or_else(AppError::invalid_token)?;

        let user = self
            .store
            .find_user_by_id(&credential.user_id)
            .await?
            .ok_or_else(AppError::invalid_token)?;
        if !user.is_active {
            return Err(ForbiddenReason::AccountDeactivated.into());
        }

        let membership = self
            .store
            .find_membership(&credential.user_id, &credential.tenant_id)
            .await?;
        let membership = match membership {
            Some(m) if m.is_active => m,
            _ => return Err(ForbiddenReason::NoTenantAccess.into()),
        };

        let config = self
            .store
            .get_tenant_login_config(&credential.tenant_id)
            .await?;
        let session_ttl = self.session_ttl(&config);

        let (access_token, session, new_refresh_token, new_credential) =
            self.mint_pair(&user, &credential.tenant_id, &membership.roles, session_ttl)?;

        self.store.create_refresh_credential(&new_credential).await?;

        let session_bytes = serde_json::to_vec(&session)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode session: {}", e)))?;
        self.sessions
            .set(&Session::key(&access_token), session_bytes, session_ttl)
            .await?;

        if let Err(e) = self.store.revoke_refresh_credential(refresh_token).await {
            tracing::warn!(error = %e, user_id = %claims.sub, "Failed to revoke rotated refresh credential");
        }

        tracing::info!(user_id = %user.id, tenant_id = %credential.tenant_id, "Refresh token rotated");

        Ok(self.pair_response(
            access_token,
            new_refresh_token,
            &user,
            &credential.tenant_id,
            &membership.roles,
            session_ttl,
        ))
    }

    /// Delete the session and best-effort revoke the newest active refresh
    /// credential for the session's (user, tenant). Revocation failure
    /// never fails logout.
    pub async fn logout(&self, access_token: &str) -> Result<(), AppError> {
        let key = Session::key(access_token);
        let session = match self.sessions.get(&key).await? {
            Some(bytes) => serde_json::from_slice::<Session>(&bytes).ok(),
            None => None,
        };

        self.sessions.delete(&key).await?;

        if let Some(session) = session {
            if let Err(e) = self
                .store
                .revoke_latest_refresh_credential(&session.user_id, &session.tenant_id)
                .await
            {
                tracing::warn!(error = %e, user_id = %session.user_id, "Failed to revoke refresh credential on logout");
            }
            tracing::info!(user_id = %session.user_id, tenant_id = %session.tenant_id, "User logged out");
        }

        Ok(())
    }

    /// Mint the short-lived continuation token handed back when a tenant
    /// requires a second factor.
    pub fn generate_mfa_token(&self, user_id: &str, tenant_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = MfaClaims {
            sub: user_id.to_string(),
            tenant_id: tenant_id.to_string(),
            token_type: "mfa".to_string(),
            iat: now.timestamp(),
            exp: (now + ChronoDuration::minutes(MFA_TOKEN_TTL_MINUTES)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode MFA token: {}", e)))
    }

    pub fn verify_mfa_token(&self, token: &str) -> Result<MfaClaims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<MfaClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::invalid_token())?;
        if data.claims.token_type != "mfa" {
            return Err(AppError::invalid_token());
        }
        Ok(data.claims)
    }

    fn decode_refresh(&self, token: &str) -> Result<RefreshClaims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<RefreshClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::invalid_token())?;
        if data.claims.token_type != "refresh" {
            return Err(AppError::invalid_token());
        }
        Ok(data.claims)
    }

    /// Build the access token, session blob, refresh token and credential
    /// row for one issuance. No writes happen here.
    fn mint_pair(
        &self,
        user: &User,
        tenant_id: &str,
        roles: &[String],
        session_ttl: Duration,
    ) -> Result<(String, Session, String, RefreshCredential), AppError> {
        let access_token = crate::utils::generate_opaque_token();
        let session = Session::new(
            user.id.clone(),
            tenant_id.to_string(),
            user.email.clone().unwrap_or_default(),
            roles.to_vec(),
            session_ttl,
        );

        let now = Utc::now();
        let expires_at = now + ChronoDuration::days(self.refresh_ttl_days);
        let claims = RefreshClaims {
            sub: user.id.clone(),
            tenant_id: tenant_id.to_string(),
            token_type: "refresh".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let refresh_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to encode refresh token: {}", e))
            })?;

        let credential = RefreshCredential::new(
            user.id.clone(),
            tenant_id.to_string(),
            refresh_token.clone(),
            expires_at,
        );

        Ok((access_token, session, refresh_token, credential))
    }

    fn pair_response(
        &self,
        access_token: String,
        refresh_token: String,
        user: &User,
        tenant_id: &str,
        roles: &[String],
        session_ttl: Duration,
    ) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: session_ttl.as_secs() as i64,
            user: UserInfo {
                id: user.id.clone(),
                email: user.email.clone(),
                tenant_id: tenant_id.to_string(),
                roles: roles.to_vec(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryStore, MemoryCache};

    fn token_service() -> (TokenService, Arc<InMemoryStore>, Arc<MemoryCache>) {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let permissions = Arc::new(PermissionService::new(store.clone(), cache.clone()));
        let config = JwtConfig {
            secret: "test-secret-for-unit-tests".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        };
        (
            TokenService::new(&config, store.clone(), cache.clone(), permissions),
            store,
            cache,
        )
    }

    fn test_user() -> User {
        User::new(
            Some("alice@example.com".to_string()),
            None,
            None,
            None,
            "hash".to_string(),
        )
    }

    #[tokio::test]
    async fn issued_access_token_verifies_immediately() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let pair = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);

        let validated = service.verify_token(&pair.access_token).await.unwrap();
        assert_eq!(validated.user_id, user.id);
        assert_eq!(validated.tenant_id, "t1");
        assert_eq!(validated.roles, vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn refresh_rotation_invalidates_old_token() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let first = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();

        let second = service.refresh_token(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_ne!(second.access_token, first.access_token);

        // Replay of the rotated token fails.
        let replay = service.refresh_token(&first.refresh_token).await;
        assert!(matches!(replay, Err(AppError::Unauthorized(_))));

        // The new token keeps working.
        let third = service.refresh_token(&second.refresh_token).await.unwrap();
        assert_ne!(third.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn old_access_token_survives_rotation_until_its_ttl() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let first = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();
        let second = service.refresh_token(&first.refresh_token).await.unwrap();

        assert!(service.verify_token(&first.access_token).await.is_ok());
        assert!(service.verify_token(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn logout_deletes_session_and_revokes_credential() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let pair = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();
        assert!(service.verify_token(&pair.access_token).await.is_ok());

        service.logout(&pair.access_token).await.unwrap();
        assert!(service.verify_token(&pair.access_token).await.is_err());
        assert!(service.refresh_token(&pair.refresh_token).await.is_err());

        // Logout is idempotent.
        assert!(service.logout(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn deactivated_user_fails_validation_with_live_session() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let pair = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();

        store.set_user_active(&user.id, false).await.unwrap();
        let result = service.verify_token(&pair.access_token).await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(ForbiddenReason::AccountDeactivated))
        ));
    }

    #[tokio::test]
    async fn revoked_membership_fails_validation_with_live_session() {
        let (service, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();

        let pair = service
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(900))
            .await
            .unwrap();

        store.deactivate_membership(&user.id, "t1").await.unwrap();
        let result = service.verify_token(&pair.access_token).await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(ForbiddenReason::NoTenantAccess))
        ));
    }

    #[tokio::test]
    async fn mfa_token_round_trip_and_type_check() {
        let (service, _, _) = token_service();
        let token = service.generate_mfa_token("u1", "t1").unwrap();
        let claims = service.verify_mfa_token(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.tenant_id, "t1");

        // A refresh token is not an MFA token.
        let (service2, store, _) = token_service();
        let user = test_user();
        store.create_user(&user).await.unwrap();
        store
            .add_membership(&user.id, "t1", &["user".to_string()])
            .await
            .unwrap();
        let pair = service2
            .generate_token_pair(&user, "t1", &["user".to_string()], Duration::from_secs(60))
            .await
            .unwrap();
        assert!(service2.verify_mfa_token(&pair.refresh_token).is_err());
    }

    #[tokio::test]
    async fn garbage_tokens_are_unauthenticated() {
        let (service, _, _) = token_service();
        assert!(service.verify_token("not-a-real-token").await.is_err());
        assert!(service.refresh_token("not-a-jwt").await.is_err());
    }
}
