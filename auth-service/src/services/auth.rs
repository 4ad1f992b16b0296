use chrono::{Duration as ChronoDuration, Utc};
use service_core::error::{AppError, ForbiddenReason};
use std::sync::Arc;

use crate::dtos::auth::{OAuthLoginRequest, RegisterRequest};
use crate::models::{
    IdentifierKind, LoginAttempt, Membership, OAuthAccount, TenantLoginConfig, User, UserLockout,
};
use crate::services::{
    CredentialStore, MfaVerifier, PermissionService, PolicyService, TokenService,
};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Role granted when registration does not name any.
const DEFAULT_ROLE: &str = "user";

/// Deadline for the detached last-login write; it must never stretch the
/// request it was spawned from.
const LAST_LOGIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// What a login produced: a token pair, or a demand for the second factor.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(crate::services::TokenPair),
    MfaRequired { mfa_token: String },
}

/// Orchestrates identifier detection, per-tenant policy gating, membership
/// enforcement, failure accounting with lockout, and token issuance.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    permissions: Arc<PermissionService>,
    mfa: Arc<dyn MfaVerifier>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: TokenService,
        permissions: Arc<PermissionService>,
        mfa: Arc<dyn MfaVerifier>,
    ) -> Self {
        Self {
            store,
            tokens,
            permissions,
            mfa,
        }
    }

    /// The login state machine. Stage failures map onto a deliberately
    /// narrow error surface; in particular user-not-found and bad-password
    /// are indistinguishable to the caller.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        tenant_id: &str,
        ip_address: &str,
    ) -> Result<LoginOutcome, AppError> {
        let config = self.store.get_tenant_login_config(tenant_id).await?;

        let user = self
            .store
            .find_user_by_identifier(identifier)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;

        let kind = IdentifierKind::detect(identifier, &user)
            .ok_or_else(AppError::invalid_credentials)?;
        if !config.is_identifier_allowed(kind) {
            return Err(ForbiddenReason::IdentifierTypeNotAllowed.into());
        }

        let membership = match self.store.find_membership(&user.id, tenant_id).await? {
            Some(m) if m.is_active => m,
            _ => return Err(ForbiddenReason::NoTenantAccess.into()),
        };

        if let Some(lockout) = self.store.find_active_lockout(&user.id, tenant_id).await? {
            return Err(ForbiddenReason::Locked {
                retry_after_seconds: lockout.remaining_seconds(),
            }
            .into());
        }

        if !user.is_active {
            return Err(ForbiddenReason::AccountDeactivated.into());
        }

        let password_ok = verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .is_ok();

        if !password_ok {
            self.account_failed_attempt(&user, identifier, tenant_id, ip_address, &config)
                .await;
            return Err(AppError::invalid_credentials());
        }

        self.store
            .record_login_attempt(&LoginAttempt::new(
                identifier.to_string(),
                tenant_id.to_string(),
                ip_address.to_string(),
                true,
            ))
            .await
            .unwrap_or_else(|e| tracing::warn!(error = %e, "Failed to record login attempt"));

        if config.require_2fa {
            let mfa_token = self.tokens.generate_mfa_token(&user.id, tenant_id)?;
            tracing::info!(user_id = %user.id, tenant_id, "Password accepted, second factor required");
            return Ok(LoginOutcome::MfaRequired { mfa_token });
        }

        let pair = self.authorize_and_issue(&user, &membership, &config).await?;

        tracing::info!(
            user_id = %user.id,
            tenant_id,
            identifier_type = kind.as_str(),
            "User logged in"
        );

        Ok(LoginOutcome::Success(pair))
    }

    /// Re-enter the state machine at authorization once the external
    /// collaborator validated the second factor.
    pub async fn complete_mfa(
        &self,
        mfa_token: &str,
        code: &str,
    ) -> Result<crate::services::TokenPair, AppError> {
        let claims = self.tokens.verify_mfa_token(mfa_token)?;

        if !self.mfa.verify(&claims.sub, &claims.tenant_id, code).await? {
            return Err(AppError::invalid_credentials());
        }

        let user = self
            .store
            .find_user_by_id(&claims.sub)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;
        if !user.is_active {
            return Err(ForbiddenReason::AccountDeactivated.into());
        }

        let membership = match self
            .store
            .find_membership(&claims.sub, &claims.tenant_id)
            .await?
        {
            Some(m) if m.is_active => m,
            _ => return Err(ForbiddenReason::NoTenantAccess.into()),
        };

        let config = self
            .store
            .get_tenant_login_config(&claims.tenant_id)
            .await?;

        tracing::info!(user_id = %user.id, tenant_id = %claims.tenant_id, "Second factor accepted");
        self.authorize_and_issue(&user, &membership, &config).await
    }

    /// Register a user and their initial membership, then issue a pair.
    ///
    /// User creation and membership creation are separate writes; when the
    /// membership write fails the user exists without access, the
    /// inconsistency is logged, and the next login surfaces
    /// `no_tenant_access` until an operator job reconciles.
    pub async fn register(
        &self,
        req: &RegisterRequest,
        ip_address: &str,
    ) -> Result<crate::services::TokenPair, AppError> {
        let config = self.store.get_tenant_login_config(&req.tenant_id).await?;
        if !config.allow_registration {
            return Err(ForbiddenReason::RegistrationDisabled.into());
        }

        PolicyService::validate_password(&req.password, &config)?;

        let user = User::new(
            req.email.clone(),
            req.username.clone(),
            req.phone.clone(),
            req.doc_number.clone(),
            String::new(),
        );
        if !user.has_identifier() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one identifier (email, username, phone, doc_number) is required"
            )));
        }

        for identifier in user.identifiers() {
            if self
                .store
                .find_user_by_identifier(identifier)
                .await?
                .is_some()
            {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "An account with one of these identifiers already exists"
                )));
            }
        }

        let password_hash = hash_password(&Password::new(req.password.clone()))
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Password hashing error: {}", e)))?;
        let user = User {
            password_hash: password_hash.into_string(),
            ..user
        };

        self.store.create_user(&user).await?;

        let roles = match &req.roles {
            Some(roles) if !roles.is_empty() => roles.clone(),
            _ => vec![DEFAULT_ROLE.to_string()],
        };

        let membership = match self.store.add_membership(&user.id, &req.tenant_id, &roles).await {
            Ok(m) => m,
            Err(e) => {
                // User row exists without tenant access; reconciliation is
                // an operator job, the client still gets a pair-less error.
                tracing::error!(
                    error = %e,
                    user_id = %user.id,
                    tenant_id = %req.tenant_id,
                    "User created but membership creation failed"
                );
                return Err(ForbiddenReason::NoTenantAccess.into());
            }
        };

        tracing::info!(user_id = %user.id, tenant_id = %req.tenant_id, ip = ip_address, "User registered");

        self.authorize_and_issue(&user, &membership, &config).await
    }

    /// Post-exchange OAuth contract: the collaborator hands over
    /// (provider, provider_id, email) and the core links or creates the
    /// account, then issues a pair for the requested tenant.
    pub async fn login_with_oauth(
        &self,
        req: &OAuthLoginRequest,
    ) -> Result<crate::services::TokenPair, AppError> {
        let provider = req
            .provider
            .parse()
            .map_err(|e: String| AppError::BadRequest(anyhow::anyhow!(e)))?;
        let config = self.store.get_tenant_login_config(&req.tenant_id).await?;

        let account = self
            .store
            .find_oauth_account(provider, &req.provider_id)
            .await?;

        let was_linked = account.is_some();
        let user = match account {
            Some(account) => self
                .store
                .find_user_by_id(&account.user_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(anyhow::anyhow!(
                        "OAuth account points at a missing user"
                    ))
                })?,
            None => {
                // Unlinked identity: link to the user owning this email, or
                // create a fresh password-less user.
                let existing = self.store.find_user_by_identifier(&req.email).await?;
                let user = match existing {
                    Some(user) => user,
                    None => {
                        if !config.allow_registration {
                            return Err(ForbiddenReason::RegistrationDisabled.into());
                        }
                        let mut user = User::new(
                            Some(req.email.clone()),
                            None,
                            None,
                            None,
                            String::new(),
                        );
                        // The provider vouched for the address.
                        user.is_verified = true;
                        self.store.create_user(&user).await?;
                        user
                    }
                };
                self.store
                    .create_oauth_account(&OAuthAccount::new(
                        user.id.clone(),
                        provider,
                        req.provider_id.clone(),
                        req.email.clone(),
                    ))
                    .await?;
                user
            }
        };

        if !user.is_active {
            return Err(ForbiddenReason::AccountDeactivated.into());
        }

        // A linked identity rides on its existing membership; only a fresh
        // link may create one, and only where registration is open.
        let membership = match self.store.find_membership(&user.id, &req.tenant_id).await? {
            Some(m) if m.is_active => m,
            None if !was_linked && config.allow_registration => {
                self.store
                    .add_membership(&user.id, &req.tenant_id, &[DEFAULT_ROLE.to_string()])
                    .await?
            }
            _ => return Err(ForbiddenReason::NoTenantAccess.into()),
        };

        tracing::info!(
            user_id = %user.id,
            tenant_id = %req.tenant_id,
            provider = provider.as_str(),
            "OAuth login"
        );

        self.authorize_and_issue(&user, &membership, &config).await
    }

    /// Verify the old password, enforce the tenant policy on the new one,
    /// re-hash, and revoke every refresh credential so other devices must
    /// log in again. Live sessions ride out their TTL.
    pub async fn change_password(
        &self,
        user_id: &str,
        tenant_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_credentials_by_id(user_id)
            .await?
            .ok_or_else(AppError::invalid_credentials)?;

        verify_password(
            &Password::new(old_password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| AppError::invalid_credentials())?;

        let config = self.store.get_tenant_login_config(tenant_id).await?;
        PolicyService::validate_password(new_password, &config)?;

        let new_hash = hash_password(&Password::new(new_password.to_string()))
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Password hashing error: {}", e)))?;

        self.store
            .update_password_hash(user_id, new_hash.as_str())
            .await?;
        self.store.revoke_all_refresh_credentials(user_id).await?;

        tracing::info!(user_id, "Password changed, refresh credentials revoked");
        Ok(())
    }

    /// Active memberships of a user, for the tenant-switcher surface.
    pub async fn list_tenants(&self, user_id: &str) -> Result<Vec<Membership>, AppError> {
        self.store.find_memberships_for_user(user_id).await
    }

    /// Grant or update tenant access. Idempotent on (user, tenant); the
    /// permission cache entry for the pair is dropped.
    pub async fn add_user_to_tenant(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<Membership, AppError> {
        let membership = self.store.add_membership(user_id, tenant_id, roles).await?;
        self.permissions.invalidate_user(user_id, tenant_id).await;
        Ok(membership)
    }

    pub async fn update_user_roles(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<(), AppError> {
        self.store
            .update_membership_roles(user_id, tenant_id, roles)
            .await?;
        self.permissions.invalidate_user(user_id, tenant_id).await;
        Ok(())
    }

    pub async fn remove_user_from_tenant(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<(), AppError> {
        self.store.deactivate_membership(user_id, tenant_id).await?;
        self.permissions.invalidate_user(user_id, tenant_id).await;
        Ok(())
    }

    /// Operator-grade kill switch: the user cannot log in, refresh, or pass
    /// token validation anywhere once this lands.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<(), AppError> {
        self.store.set_user_active(user_id, false).await?;
        self.store.revoke_all_refresh_credentials(user_id).await?;
        tracing::info!(user_id, "User deactivated");
        Ok(())
    }

    /// Resolve roles and permissions, issue the pair, and kick off the
    /// detached last-login write.
    async fn authorize_and_issue(
        &self,
        user: &User,
        membership: &Membership,
        config: &TenantLoginConfig,
    ) -> Result<crate::services::TokenPair, AppError> {
        // A failed resolution must not block login; the gateway re-resolves
        // on validation anyway.
        if let Err(e) = self
            .permissions
            .get_user_permissions(&user.id, &membership.tenant_id)
            .await
        {
            tracing::error!(error = %e, user_id = %user.id, "Failed to warm permission cache");
        }

        let pair = self
            .tokens
            .generate_token_pair(
                user,
                &membership.tenant_id,
                &membership.roles,
                self.tokens.session_ttl(config),
            )
            .await?;

        // Fire-and-forget with its own deadline; its failure never fails
        // the login.
        let store = self.store.clone();
        let user_id = user.id.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(LAST_LOGIN_TIMEOUT, store.update_last_login(&user_id)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, user_id = %user_id, "Failed to update last login")
                }
                Err(_) => tracing::warn!(user_id = %user_id, "Last login update timed out"),
            }
        });

        Ok(pair)
    }

    /// Record the failure and lock the account when the trailing window
    /// crosses the tenant's threshold.
    async fn account_failed_attempt(
        &self,
        user: &User,
        identifier: &str,
        tenant_id: &str,
        ip_address: &str,
        config: &TenantLoginConfig,
    ) {
        if let Err(e) = self
            .store
            .record_login_attempt(&LoginAttempt::new(
                identifier.to_string(),
                tenant_id.to_string(),
                ip_address.to_string(),
                false,
            ))
            .await
        {
            tracing::warn!(error = %e, "Failed to record login attempt");
            return;
        }

        let window_start = Utc::now() - ChronoDuration::minutes(config.lockout_duration_minutes);
        let attempts = match self
            .store
            .find_recent_attempts(identifier, tenant_id, window_start)
            .await
        {
            Ok(attempts) => attempts,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load recent login attempts");
                return;
            }
        };

        let failures = attempts.iter().filter(|a| !a.success).count() as u64;
        if failures >= config.max_login_attempts {
            let lockout = UserLockout::new(
                user.id.clone(),
                tenant_id.to_string(),
                config.lockout_duration_minutes,
                format!("{} failed login attempts", failures),
            );
            if let Err(e) = self.store.create_lockout(&lockout).await {
                tracing::error!(error = %e, user_id = %user.id, "Failed to create lockout");
            } else {
                tracing::warn!(
                    user_id = %user.id,
                    tenant_id,
                    failures,
                    unlock_at = %lockout.unlock_at,
                    "Account locked after repeated failures"
                );
            }
        }
    }
}
