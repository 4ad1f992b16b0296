use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{
    LoginAttempt, Membership, OAuthAccount, OAuthProvider, RefreshCredential, Role,
    TenantLoginConfig, User, UserLockout,
};
use crate::services::CredentialStore;

/// In-memory credential store with the same uniqueness and validity
/// semantics as the MongoDB implementation. Backs the integration tests so
/// the whole engine can be exercised without external services.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    memberships: Vec<Membership>,
    roles: Vec<Role>,
    refresh_credentials: Vec<RefreshCredential>,
    login_attempts: Vec<LoginAttempt>,
    lockouts: Vec<UserLockout>,
    login_configs: HashMap<String, TenantLoginConfig>,
    oauth_accounts: Vec<OAuthAccount>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn without_hash(mut user: User) -> User {
    user.password_hash = String::new();
    user
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for existing in &inner.users {
            for identifier in user.identifiers() {
                if existing.identifiers().contains(&identifier) {
                    return Err(AppError::Conflict(anyhow::anyhow!(
                        "An account with one of these identifiers already exists"
                    )));
                }
            }
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .find(|u| u.identifiers().contains(&identifier))
            .cloned())
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(without_hash))
    }

    async fn find_user_credentials_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = hash.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_last_login(&self, user_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = active;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn add_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<Membership, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
        {
            existing.roles = roles.to_vec();
            existing.is_active = true;
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let membership = Membership::new(
            user_id.to_string(),
            tenant_id.to_string(),
            roles.to_vec(),
        );
        inner.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn find_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Membership>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active)
            .cloned()
            .collect())
    }

    async fn update_membership_roles(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
        {
            Some(membership) => {
                membership.roles = roles.to_vec();
                membership.updated_at = Utc::now();
                Ok(())
            }
            None => Err(AppError::BadRequest(anyhow::anyhow!("Membership not found"))),
        }
    }

    async fn deactivate_membership(&self, user_id: &str, tenant_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        match inner
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.tenant_id == tenant_id)
        {
            Some(membership) => {
                membership.is_active = false;
                membership.updated_at = Utc::now();
                Ok(())
            }
            None => Err(AppError::BadRequest(anyhow::anyhow!("Membership not found"))),
        }
    }

    async fn find_roles_by_names(
        &self,
        names: &[String],
        tenant_id: &str,
    ) -> Result<Vec<Role>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .roles
            .iter()
            .filter(|r| {
                names.contains(&r.name)
                    && (r.tenant_id.is_none() || r.tenant_id.as_deref() == Some(tenant_id))
            })
            .cloned()
            .collect())
    }

    async fn aggregate_permissions(
        &self,
        roles: &[String],
        tenant_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let found = self.find_roles_by_names(roles, tenant_id).await?;
        let mut seen = std::collections::HashSet::new();
        let mut permissions = Vec::new();
        for role in found {
            for permission in role.permissions {
                if seen.insert(permission.clone()) {
                    permissions.push(permission);
                }
            }
        }
        Ok(permissions)
    }

    async fn upsert_role(&self, role: &Role) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .roles
            .iter_mut()
            .find(|r| r.name == role.name && r.tenant_id == role.tenant_id)
        {
            *existing = role.clone();
        } else {
            inner.roles.push(role.clone());
        }
        Ok(())
    }

    async fn create_refresh_credential(
        &self,
        credential: &RefreshCredential,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .refresh_credentials
            .iter()
            .any(|c| c.token == credential.token)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Refresh token already exists"
            )));
        }
        inner.refresh_credentials.push(credential.clone());
        Ok(())
    }

    async fn find_refresh_credential(
        &self,
        token: &str,
    ) -> Result<Option<RefreshCredential>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refresh_credentials
            .iter()
            .find(|c| c.token == token && c.is_valid())
            .cloned())
    }

    async fn revoke_refresh_credential(&self, token: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(credential) = inner
            .refresh_credentials
            .iter_mut()
            .find(|c| c.token == token)
        {
            credential.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_all_refresh_credentials(&self, user_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        for credential in inner
            .refresh_credentials
            .iter_mut()
            .filter(|c| c.user_id == user_id && c.revoked_at.is_none())
        {
            credential.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn revoke_latest_refresh_credential(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(credential) = inner
            .refresh_credentials
            .iter_mut()
            .filter(|c| c.user_id == user_id && c.tenant_id == tenant_id && c.revoked_at.is_none())
            .max_by_key(|c| c.created_at)
        {
            credential.revoked_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn count_active_refresh_credentials(&self, user_id: &str) -> Result<u64, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refresh_credentials
            .iter()
            .filter(|c| c.user_id == user_id && c.is_valid())
            .count() as u64)
    }

    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.login_attempts.push(attempt.clone());
        Ok(())
    }

    async fn find_recent_attempts(
        &self,
        identifier: &str,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .login_attempts
            .iter()
            .filter(|a| {
                a.identifier == identifier && a.tenant_id == tenant_id && a.attempt_at >= since
            })
            .cloned()
            .collect())
    }

    async fn create_lockout(&self, lockout: &UserLockout) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.lockouts.push(lockout.clone());
        Ok(())
    }

    async fn find_active_lockout(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<UserLockout>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .lockouts
            .iter()
            .filter(|l| l.user_id == user_id && l.tenant_id == tenant_id && l.is_in_effect())
            .max_by_key(|l| l.unlock_at)
            .cloned())
    }

    async fn get_tenant_login_config(
        &self,
        tenant_id: &str,
    ) -> Result<TenantLoginConfig, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .login_configs
            .get(tenant_id)
            .cloned()
            .unwrap_or_else(|| TenantLoginConfig::default_for(tenant_id)))
    }

    async fn upsert_tenant_login_config(
        &self,
        config: &TenantLoginConfig,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .login_configs
            .insert(config.tenant_id.clone(), config.clone());
        Ok(())
    }

    async fn find_oauth_account(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<OAuthAccount>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .oauth_accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_id == provider_id)
            .cloned())
    }

    async fn create_oauth_account(&self, account: &OAuthAccount) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .oauth_accounts
            .iter()
            .any(|a| a.provider == account.provider && a.provider_id == account.provider_id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "OAuth account is already linked"
            )));
        }
        inner.oauth_accounts.push(account.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
