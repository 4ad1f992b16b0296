//! Edge gateway: bearer validation with a local cache, internal token
//! minting, and per-tenant reverse-proxy routing to downstream services.

pub mod cache;
pub mod config;
pub mod internal_token;
pub mod proxy;
pub mod routes;
pub mod services;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use service_core::error::AppError;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::cache::TokenCache;
use crate::config::GatewayConfig;
use crate::internal_token::InternalTokenSigner;
use crate::routes::classify;
use crate::services::{AuthClient, ValidatedClaims};

#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub http: reqwest::Client,
    pub auth_client: AuthClient,
    pub token_cache: Arc<TokenCache>,
    pub signer: InternalTokenSigner,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        let auth_client = AuthClient::new(config.auth_service_url.clone());
        let token_cache = Arc::new(TokenCache::new(std::time::Duration::from_secs(
            config.token_cache_ttl_seconds,
        )));
        let signer = InternalTokenSigner::new(
            &config.internal_token_secret,
            config.internal_token_ttl_seconds,
        );
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            auth_client,
            token_cache,
            signer,
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(gateway_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.config.service_name,
    }))
}

/// The proxy front-half: classify, authenticate where required, mint the
/// internal token, and forward.
async fn gateway_handler(
    State(state): State<GatewayState>,
    req: Request,
) -> Result<Response, AppError> {
    let target = classify(req.uri().path());

    let Some(base_url) = state.config.service_url(&target.service) else {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "No service registered for this route"
        )));
    };
    let base_url = base_url.to_string();

    let mut extra_headers = HeaderMap::new();

    if target.requires_auth {
        let use_cache = !state.config.bypasses_cache(&target.service);
        let claims = authenticate(&state, req.headers(), use_cache).await?;

        let internal_token = state.signer.mint(&claims)?;
        extra_headers.insert(
            "X-Tenant-ID",
            HeaderValue::from_str(&claims.tenant_id).map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Invalid tenant id header: {}", e))
            })?,
        );
        extra_headers.insert(header::AUTHORIZATION, proxy::bearer_header(&internal_token)?);
    }

    proxy::forward(&state.http, &base_url, &target.path, req, extra_headers).await
}

/// Bearer extraction, local cache consultation, then the validator call.
/// Services marked for strict revocation skip the cache entirely.
async fn authenticate(
    state: &GatewayState,
    headers: &HeaderMap,
    use_cache: bool,
) -> Result<Arc<ValidatedClaims>, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let tenant_header = headers
        .get("X-Tenant-ID")
        .and_then(|value| value.to_str().ok());

    let cache_key = TokenCache::key(token, tenant_header);
    if use_cache {
        if let Some(claims) = state.token_cache.get(&cache_key) {
            return Ok(claims);
        }
    }

    let claims = state
        .auth_client
        .validate_token(token, tenant_header)
        .await?
        .ok_or_else(AppError::invalid_token)?;

    let claims = Arc::new(claims);
    if use_cache {
        state.token_cache.insert(cache_key, claims.clone());
    }
    Ok(claims)
}
