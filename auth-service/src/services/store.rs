use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;

use crate::models::{
    LoginAttempt, Membership, OAuthAccount, OAuthProvider, RefreshCredential, Role,
    TenantLoginConfig, User, UserLockout,
};

/// Persistence contract for users, memberships, roles, refresh credentials,
/// tenant login configs, lockouts and attempt records.
///
/// The production implementation is MongoDB ([`super::MongoDb`]); tests run
/// against [`super::InMemoryStore`]. All implementations enforce the same
/// uniqueness rules: each non-empty user identifier is globally unique, one
/// membership row per (user, tenant), refresh tokens unique, one login
/// config per tenant, one OAuth account per (provider, provider_id).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // -- users -----------------------------------------------------------

    /// Insert a user. Fails with `Conflict` when any provided identifier
    /// collides with an existing user.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    /// Look up a user by any identifier field in a single round-trip.
    /// This is the login path: the returned row includes the password hash.
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>, AppError>;

    /// API-bound read: the password hash is projected away.
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Credential read by id, hash included. Only the password-change path
    /// uses this.
    async fn find_user_credentials_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), AppError>;

    async fn update_last_login(&self, user_id: &str) -> Result<(), AppError>;

    async fn set_user_active(&self, user_id: &str, active: bool) -> Result<(), AppError>;

    // -- memberships -----------------------------------------------------

    /// Idempotent on (user, tenant): replaces roles on an existing row and
    /// reactivates it if it was deactivated; inserts otherwise.
    async fn add_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<Membership, AppError>;

    async fn find_membership(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<Membership>, AppError>;

    /// Active memberships for a user, across tenants.
    async fn find_memberships_for_user(&self, user_id: &str) -> Result<Vec<Membership>, AppError>;

    async fn update_membership_roles(
        &self,
        user_id: &str,
        tenant_id: &str,
        roles: &[String],
    ) -> Result<(), AppError>;

    async fn deactivate_membership(&self, user_id: &str, tenant_id: &str) -> Result<(), AppError>;

    // -- roles -----------------------------------------------------------

    /// Roles matching any of `names` whose tenant equals `tenant_id` or is
    /// unset (system-wide).
    async fn find_roles_by_names(
        &self,
        names: &[String],
        tenant_id: &str,
    ) -> Result<Vec<Role>, AppError>;

    /// De-duplicated union of the permission strings of the given roles.
    async fn aggregate_permissions(
        &self,
        roles: &[String],
        tenant_id: &str,
    ) -> Result<Vec<String>, AppError>;

    async fn upsert_role(&self, role: &Role) -> Result<(), AppError>;

    // -- refresh credentials ---------------------------------------------

    async fn create_refresh_credential(&self, credential: &RefreshCredential)
        -> Result<(), AppError>;

    /// Lookup by token string. The validity predicate (`revoked_at` null and
    /// `expires_at` in the future) is enforced here, in the query itself.
    async fn find_refresh_credential(
        &self,
        token: &str,
    ) -> Result<Option<RefreshCredential>, AppError>;

    async fn revoke_refresh_credential(&self, token: &str) -> Result<(), AppError>;

    async fn revoke_all_refresh_credentials(&self, user_id: &str) -> Result<(), AppError>;

    /// Revoke the most recently created active credential for (user, tenant).
    /// Logout's best-effort cleanup; the session blob does not record which
    /// refresh token it was issued with.
    async fn revoke_latest_refresh_credential(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<(), AppError>;

    async fn count_active_refresh_credentials(&self, user_id: &str) -> Result<u64, AppError>;

    // -- attempts & lockouts ---------------------------------------------

    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> Result<(), AppError>;

    /// Attempts for (identifier, tenant) since the given instant, newest
    /// last. Callers count the failures.
    async fn find_recent_attempts(
        &self,
        identifier: &str,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LoginAttempt>, AppError>;

    async fn create_lockout(&self, lockout: &UserLockout) -> Result<(), AppError>;

    /// The active lockout row for (user, tenant) with the latest unlock
    /// time, if any. Rows whose `unlock_at` has passed are not returned.
    async fn find_active_lockout(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Option<UserLockout>, AppError>;

    // -- tenant login config ---------------------------------------------

    /// Never fails with not-found: tenants without a row get the default
    /// sentinel config.
    async fn get_tenant_login_config(&self, tenant_id: &str)
        -> Result<TenantLoginConfig, AppError>;

    async fn upsert_tenant_login_config(&self, config: &TenantLoginConfig)
        -> Result<(), AppError>;

    // -- oauth accounts --------------------------------------------------

    async fn find_oauth_account(
        &self,
        provider: OAuthProvider,
        provider_id: &str,
    ) -> Result<Option<OAuthAccount>, AppError>;

    async fn create_oauth_account(&self, account: &OAuthAccount) -> Result<(), AppError>;

    // -- health ----------------------------------------------------------

    async fn health_check(&self) -> Result<(), AppError>;
}
