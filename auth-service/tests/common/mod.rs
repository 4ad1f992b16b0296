//! Test helpers for auth-service integration tests.
//!
//! The engine is wired with in-memory implementations of the credential
//! store and the session cache, so every flow runs without external
//! services and the tests can seed state directly through the store.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::util::ServiceExt;

use auth_service::{
    build_router,
    config::{
        AuthConfig, Environment, JwtConfig, MongoConfig, OAuthConfig, RateLimitConfig, RedisConfig,
    },
    models::{Role, TenantLoginConfig},
    services::{
        AuthService, Cache, CredentialStore, InMemoryStore, MemoryCache, PermissionService,
        StaticMfaVerifier, TokenService,
    },
    AppState,
};

/// Code the test MFA verifier accepts.
pub const TEST_MFA_CODE: &str = "424242";

/// Password satisfying the default sentinel policy.
pub const TEST_PASSWORD: &str = "Passw0rd123";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<MemoryCache>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let config = test_config();

        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(MemoryCache::new());

        let store_dyn: Arc<dyn CredentialStore> = store.clone();
        let cache_dyn: Arc<dyn Cache> = cache.clone();

        let permissions = Arc::new(PermissionService::new(store_dyn.clone(), cache_dyn.clone()));
        let tokens = TokenService::new(
            &config.jwt,
            store_dyn.clone(),
            cache_dyn.clone(),
            permissions.clone(),
        );
        let auth = AuthService::new(
            store_dyn.clone(),
            tokens.clone(),
            permissions.clone(),
            Arc::new(StaticMfaVerifier::new(TEST_MFA_CODE)),
        );

        let state = AppState {
            config,
            store: store_dyn,
            cache: cache_dyn,
            permissions,
            tokens,
            auth,
        };

        Self {
            state,
            store,
            cache,
        }
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.request("POST", path, Some(body), None).await
    }

    pub async fn post_with_auth(
        &self,
        path: &str,
        token: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request("POST", path, Some(body), Some(token)).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, serde_json::Value) {
        self.request("GET", path, None, None).await
    }

    pub async fn get_with_auth(&self, path: &str, token: &str) -> (StatusCode, serde_json::Value) {
        self.request("GET", path, None, Some(token)).await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => Body::from(serde_json::to_vec(&json).unwrap()),
            None => Body::empty(),
        };

        let response = build_router(self.state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    /// Register a user through the API and return the token pair body.
    pub async fn register_user(&self, email: &str, tenant_id: &str) -> serde_json::Value {
        let (status, body) = self
            .post(
                "/api/v1/auth/register",
                serde_json::json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "tenant_id": tenant_id,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body
    }

    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        tenant_id: &str,
    ) -> (StatusCode, serde_json::Value) {
        self.post(
            "/api/v1/auth/login",
            serde_json::json!({
                "identifier": identifier,
                "password": password,
                "tenant_id": tenant_id,
            }),
        )
        .await
    }

    pub async fn seed_login_config(&self, config: &TenantLoginConfig) {
        self.store.upsert_tenant_login_config(config).await.unwrap();
    }

    pub async fn seed_role(&self, name: &str, tenant_id: Option<&str>, permissions: &[&str]) {
        let role = Role::new(
            name.to_string(),
            tenant_id.map(String::from),
            permissions.iter().map(|p| p.to_string()).collect(),
        );
        self.store.upsert_role(&role).await.unwrap();
    }
}

fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Dev,
        service_name: "auth-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        port: 8080,
        mongodb: MongoConfig {
            uri: "mongodb://unused:27017".to_string(),
            database: "unused".to_string(),
            min_pool_size: 1,
            max_pool_size: 2,
        },
        redis: RedisConfig {
            addr: "unused:6379".to_string(),
            password: None,
            db: 0,
        },
        jwt: JwtConfig {
            secret: "test-secret-not-for-production".to_string(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 7,
        },
        // High enough that tests never trip the limiter.
        rate_limit: RateLimitConfig {
            login_per_minute: 10_000,
            register_per_hour: 10_000,
            refresh_per_minute: 10_000,
            oauth_per_minute: 10_000,
        },
        oauth: OAuthConfig {
            google: None,
            github: None,
        },
    }
}
