//! Multi-tenant authentication and authorization engine.
//!
//! MongoDB-backed credential store, Redis-backed session store, opaque
//! access tokens plus signed refresh credentials, and an RBAC permission
//! resolver with a two-level cache.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthConfig;
use crate::handlers::{auth, health};
use crate::middleware::auth_middleware;
use crate::services::{AuthService, Cache, CredentialStore, PermissionService, TokenService};
use service_core::middleware::rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn CredentialStore>,
    pub cache: Arc<dyn Cache>,
    pub permissions: Arc<PermissionService>,
    pub tokens: TokenService,
    pub auth: AuthService,
}

/// Build the application router.
///
/// Rate limits sit in front of the credential-sensitive routes; the bearer
/// middleware wraps logout, password change and the tenant list.
pub fn build_router(state: AppState) -> Router {
    let limits = &state.config.rate_limit;
    let login_limiter = create_ip_rate_limiter(limits.login_per_minute, 60);
    let register_limiter = create_ip_rate_limiter(limits.register_per_hour, 3600);
    let refresh_limiter = create_ip_rate_limiter(limits.refresh_per_minute, 60);
    let oauth_limiter = create_ip_rate_limiter(limits.oauth_per_minute, 60);

    let login_routes = Router::new()
        .route("/login", post(auth::login))
        .route_layer(from_fn_with_state(login_limiter, ip_rate_limit_middleware));

    let register_routes = Router::new()
        .route("/register", post(auth::register))
        .route_layer(from_fn_with_state(
            register_limiter,
            ip_rate_limit_middleware,
        ));

    let refresh_routes = Router::new()
        .route("/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(
            refresh_limiter,
            ip_rate_limit_middleware,
        ));

    let oauth_routes = Router::new()
        .route("/oauth", post(auth::oauth_login))
        .route_layer(from_fn_with_state(oauth_limiter, ip_rate_limit_middleware));

    let open_routes = Router::new()
        .route("/mfa/complete", post(auth::complete_mfa))
        .route("/validate", post(auth::validate))
        .route("/login-config/:tenant_id", get(auth::login_config));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/password", post(auth::change_password))
        .route("/tenants", get(auth::list_tenants))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let auth_routes = login_routes
        .merge(register_routes)
        .merge(refresh_routes)
        .merge(oauth_routes)
        .merge(open_routes)
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api/v1/auth", auth_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
