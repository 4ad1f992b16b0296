use dashmap::DashMap;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::PermissionSet;
use crate::services::{Cache, CredentialStore};

/// L1 entries live at most this long; the L2 TTL bounds total staleness.
const L1_TTL: Duration = Duration::from_secs(60);
const L2_TTL: Duration = Duration::from_secs(300);

/// Resolves (user, tenant) to the set of permission strings granted through
/// the membership's roles, with a process-local L1 over a shared L2 cache.
///
/// Cached entries are derived data, never authoritative: role mutations
/// invalidate both levels for the affected keys, and anything missed
/// converges within one L2 lifetime.
pub struct PermissionService {
    store: Arc<dyn CredentialStore>,
    l2: Arc<dyn Cache>,
    l1: DashMap<String, L1Entry>,
}

struct L1Entry {
    permissions: Arc<Vec<String>>,
    expires_at: Instant,
}

fn permissions_key(user_id: &str, tenant_id: &str) -> String {
    format!("permissions:{}:{}", user_id, tenant_id)
}

impl PermissionService {
    pub fn new(store: Arc<dyn CredentialStore>, l2: Arc<dyn Cache>) -> Self {
        Self {
            store,
            l2,
            l1: DashMap::new(),
        }
    }

    /// All permissions the user holds in the tenant. Empty when the
    /// membership is missing or inactive.
    pub async fn get_user_permissions(
        &self,
        user_id: &str,
        tenant_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let key = permissions_key(user_id, tenant_id);

        if let Some(entry) = self.l1.get(&key) {
            if entry.expires_at > Instant::now() {
                tracing::debug!(user_id, tenant_id, "Permission L1 cache hit");
                return Ok(entry.permissions.as_ref().clone());
            }
        }

        match self.l2.get(&key).await {
            Ok(Some(bytes)) => {
                if let Ok(permissions) = serde_json::from_slice::<Vec<String>>(&bytes) {
                    if !permissions.is_empty() {
                        tracing::debug!(user_id, tenant_id, "Permission L2 cache hit");
                        self.populate_l1(&key, &permissions);
                        return Ok(permissions);
                    }
                }
            }
            Ok(None) => {}
            // A degraded cache must not fail authorization; fall through to
            // the store.
            Err(e) => {
                tracing::warn!(error = %e, "Permission L2 cache unavailable");
            }
        }

        tracing::debug!(user_id, tenant_id, "Permission cache miss, loading from store");
        let membership = self.store.find_membership(user_id, tenant_id).await?;
        let permissions = match membership {
            Some(m) if m.is_active => {
                self.store
                    .aggregate_permissions(&m.roles, tenant_id)
                    .await?
            }
            _ => return Ok(Vec::new()),
        };

        if !permissions.is_empty() {
            if let Ok(bytes) = serde_json::to_vec(&permissions) {
                if let Err(e) = self.l2.set(&key, bytes, L2_TTL).await {
                    tracing::warn!(error = %e, "Failed to populate permission L2 cache");
                }
            }
            self.populate_l1(&key, &permissions);
        }

        Ok(permissions)
    }

    pub async fn check_permission(
        &self,
        user_id: &str,
        tenant_id: &str,
        required: &str,
    ) -> Result<bool, AppError> {
        let permissions = self.get_user_permissions(user_id, tenant_id).await?;
        Ok(PermissionSet::new(&permissions).has(required))
    }

    /// True iff the user holds every one of `required`.
    pub async fn check_permissions(
        &self,
        user_id: &str,
        tenant_id: &str,
        required: &[&str],
    ) -> Result<(bool, Vec<String>), AppError> {
        let permissions = self.get_user_permissions(user_id, tenant_id).await?;
        let set = PermissionSet::new(&permissions);
        let missing: Vec<String> = set.missing(required).into_iter().map(String::from).collect();
        Ok((missing.is_empty(), missing))
    }

    /// True iff the user holds at least one of `required`.
    pub async fn check_any_permission(
        &self,
        user_id: &str,
        tenant_id: &str,
        required: &[&str],
    ) -> Result<bool, AppError> {
        let permissions = self.get_user_permissions(user_id, tenant_id).await?;
        Ok(PermissionSet::new(&permissions).has_any(required.iter().copied()))
    }

    /// Drop cached permissions for one (user, tenant). Called on membership
    /// role changes and deactivation.
    pub async fn invalidate_user(&self, user_id: &str, tenant_id: &str) {
        let key = permissions_key(user_id, tenant_id);
        self.l1.remove(&key);
        if let Err(e) = self.l2.delete(&key).await {
            tracing::warn!(error = %e, user_id, tenant_id, "Failed to invalidate permission L2 cache");
        }
        tracing::info!(user_id, tenant_id, "Invalidated permission cache");
    }

    /// Drop every cached entry for a tenant. Called on tenant-wide role
    /// mutations.
    pub async fn invalidate_tenant(&self, tenant_id: &str) {
        let suffix = format!(":{}", tenant_id);
        self.l1.retain(|key, _| !key.ends_with(&suffix));
        let pattern = format!("permissions:*{}", suffix);
        match self.l2.delete_pattern(&pattern).await {
            Ok(deleted) => {
                tracing::info!(tenant_id, deleted, "Invalidated tenant permission cache");
            }
            Err(e) => {
                // Stale entries expire within the L2 TTL anyway.
                tracing::warn!(error = %e, tenant_id, "Tenant-wide cache invalidation failed");
            }
        }
    }

    fn populate_l1(&self, key: &str, permissions: &[String]) {
        self.l1.insert(
            key.to_string(),
            L1Entry {
                permissions: Arc::new(permissions.to_vec()),
                expires_at: Instant::now() + L1_TTL,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::{InMemoryStore, MemoryCache};

    async fn service_with_admin_user() -> (PermissionService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        store
            .upsert_role(&Role::new(
                "admin".to_string(),
                Some("t1".to_string()),
                vec!["user.*".to_string(), "billing.read".to_string()],
            ))
            .await
            .unwrap();
        store
            .add_membership("u1", "t1", &["admin".to_string()])
            .await
            .unwrap();
        let service = PermissionService::new(store.clone(), cache);
        (service, store)
    }

    #[tokio::test]
    async fn resolves_permissions_through_roles() {
        let (service, _) = service_with_admin_user().await;
        let permissions = service.get_user_permissions("u1", "t1").await.unwrap();
        assert!(permissions.contains(&"user.*".to_string()));
        assert!(permissions.contains(&"billing.read".to_string()));
    }

    #[tokio::test]
    async fn wildcard_checks() {
        let (service, _) = service_with_admin_user().await;
        assert!(service.check_permission("u1", "t1", "user.read").await.unwrap());
        assert!(service.check_permission("u1", "t1", "billing.read").await.unwrap());
        assert!(!service.check_permission("u1", "t1", "billing.write").await.unwrap());
    }

    #[tokio::test]
    async fn missing_membership_resolves_empty() {
        let (service, _) = service_with_admin_user().await;
        assert!(service
            .get_user_permissions("u1", "other-tenant")
            .await
            .unwrap()
            .is_empty());
        assert!(!service
            .check_permission("stranger", "t1", "user.read")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn invalidation_picks_up_role_removal() {
        let (service, store) = service_with_admin_user().await;
        assert!(service.check_permission("u1", "t1", "user.read").await.unwrap());

        store
            .update_membership_roles("u1", "t1", &["viewer".to_string()])
            .await
            .unwrap();
        // Still cached until invalidated.
        assert!(service.check_permission("u1", "t1", "user.read").await.unwrap());

        service.invalidate_user("u1", "t1").await;
        assert!(!service.check_permission("u1", "t1", "user.read").await.unwrap());
    }

    #[tokio::test]
    async fn tenant_invalidation_clears_all_users() {
        let (service, store) = service_with_admin_user().await;
        store
            .add_membership("u2", "t1", &["admin".to_string()])
            .await
            .unwrap();
        assert!(service.check_permission("u1", "t1", "user.read").await.unwrap());
        assert!(service.check_permission("u2", "t1", "user.read").await.unwrap());

        store
            .upsert_role(&Role::new(
                "admin".to_string(),
                Some("t1".to_string()),
                vec!["billing.read".to_string()],
            ))
            .await
            .unwrap();
        service.invalidate_tenant("t1").await;

        assert!(!service.check_permission("u1", "t1", "user.read").await.unwrap());
        assert!(!service.check_permission("u2", "t1", "user.read").await.unwrap());
    }

    #[tokio::test]
    async fn check_permissions_reports_missing() {
        let (service, _) = service_with_admin_user().await;
        let (ok, missing) = service
            .check_permissions("u1", "t1", &["user.read", "report.export"])
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(missing, vec!["report.export".to_string()]);

        let any = service
            .check_any_permission("u1", "t1", &["report.export", "user.delete"])
            .await
            .unwrap();
        assert!(any);
    }

    #[tokio::test]
    async fn system_wide_roles_apply_to_any_tenant() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        store
            .upsert_role(&Role::new(
                "super".to_string(),
                None,
                vec!["*".to_string()],
            ))
            .await
            .unwrap();
        store
            .add_membership("root", "t9", &["super".to_string()])
            .await
            .unwrap();
        let service = PermissionService::new(store, cache);
        assert!(service.check_permission("root", "t9", "anything.at-all").await.unwrap());
    }
}
