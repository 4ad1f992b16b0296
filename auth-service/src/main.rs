use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use auth_service::config::AuthConfig;
use auth_service::services::{
    AuthService, Cache, CredentialStore, MongoDb, PermissionService, RedisCache,
    StaticMfaVerifier, TokenService,
};
use auth_service::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Fail fast on invalid configuration
    let config = AuthConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    service_core::observability::init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    if config.oauth.google.is_some() {
        tracing::info!("Google OAuth provider configured");
    }
    if config.oauth.github.is_some() {
        tracing::info!("GitHub OAuth provider configured");
    }

    let mongo = MongoDb::connect(&config.mongodb)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    mongo
        .initialize_indexes()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let store: Arc<dyn CredentialStore> = Arc::new(mongo);

    let cache: Arc<dyn Cache> = Arc::new(
        RedisCache::connect(&config.redis.url())
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let permissions = Arc::new(PermissionService::new(store.clone(), cache.clone()));
    let tokens = TokenService::new(&config.jwt, store.clone(), cache.clone(), permissions.clone());
    let auth = AuthService::new(
        store.clone(),
        tokens.clone(),
        permissions.clone(),
        Arc::new(StaticMfaVerifier::default()),
    );

    let state = AppState {
        config: config.clone(),
        store,
        cache,
        permissions,
        tokens,
        auth,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
