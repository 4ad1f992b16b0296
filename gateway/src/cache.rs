use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::services::ValidatedClaims;

/// Process-local cache of validated bearer tokens, keyed by
/// `(token, tenant header)`.
///
/// A performance shim only: entries never outlive their TTL, and a logout
/// is visible here at worst one TTL after the session store saw it.
pub struct TokenCache {
    entries: DashMap<String, CachedEntry>,
    ttl: Duration,
}

struct CachedEntry {
    claims: Arc<ValidatedClaims>,
    expires_at: Instant,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn key(token: &str, tenant_header: Option<&str>) -> String {
        format!("token:{}:{}", token, tenant_header.unwrap_or(""))
    }

    pub fn get(&self, key: &str) -> Option<Arc<ValidatedClaims>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.claims.clone());
            }
        }
        self.entries
            .remove_if(key, |_, e| e.expires_at <= Instant::now());
        None
    }

    pub fn insert(&self, key: String, claims: Arc<ValidatedClaims>) {
        self.entries.insert(
            key,
            CachedEntry {
                claims,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Arc<ValidatedClaims> {
        Arc::new(ValidatedClaims {
            user_id: "u1".to_string(),
            tenant_id: "t1".to_string(),
            email: Some("a@b.c".to_string()),
            roles: vec!["user".to_string()],
            permissions: vec!["user.read".to_string()],
        })
    }

    #[test]
    fn hit_within_ttl_miss_after() {
        let cache = TokenCache::new(Duration::from_millis(30));
        let key = TokenCache::key("tok", Some("t1"));
        cache.insert(key.clone(), claims());

        assert!(cache.get(&key).is_some());
        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn key_includes_tenant_header() {
        assert_ne!(
            TokenCache::key("tok", Some("t1")),
            TokenCache::key("tok", Some("t2"))
        );
        assert_ne!(TokenCache::key("tok", Some("t1")), TokenCache::key("tok", None));
    }
}
