use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use service_core::error::AppError;
use std::time::{Duration, Instant};

/// Short-TTL key → opaque-blob store.
///
/// Holds both the session blobs (`session:{token}`) and the resolver's L2
/// permission cache (`permissions:{user}:{tenant}`). Values are encoded
/// bytes; callers own the serialization. TTLs are enforced by the store
/// with second precision.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AppError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// Delete keys matching a glob pattern, scanning in bounded batches so
    /// a large keyspace never blocks other clients.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(url)?;
        // ConnectionManager reconnects automatically
        let manager = client.get_connection_manager().await?;
        tracing::info!("Connected to Redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError> {
        // SCAN + DEL in batches, never KEYS: a blocking full-keyspace scan
        // would stall other clients.
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                let removed: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await?;
                deleted += removed;
            }
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

/// In-memory cache with real TTL semantics, for tests and local runs.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Glob match supporting only `*` wildcards, which is all the engine uses.
fn glob_match(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = key;

    let first = segments[0];
    if !first.is_empty() {
        match rest.strip_prefix(first) {
            Some(r) => rest = r,
            None => return false,
        }
    }

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }

    let last = segments[segments.len() - 1];
    last.is_empty() || rest.ends_with(last)
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AppError> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= Instant::now());
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, AppError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|e| glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        let count = matching.len() as u64;
        for key in matching {
            self.entries.remove(&key);
        }
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
