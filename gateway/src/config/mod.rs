use service_core::error::AppError;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub service_name: String,
    pub log_level: String,
    pub port: u16,
    pub auth_service_url: String,
    /// HS256 secret for internal tokens; shared with downstream services.
    pub internal_token_secret: String,
    pub internal_token_ttl_seconds: i64,
    pub token_cache_ttl_seconds: u64,
    /// Logical service name → base URL.
    services: HashMap<String, String>,
    /// Services that need strict immediate revocation skip the local
    /// bearer cache and hit the validator every time.
    cache_bypass_services: Vec<String>,
}

impl GatewayConfig {
    /// Programmatic construction, used by embedding code and tests.
    pub fn new(auth_service_url: impl Into<String>, internal_token_secret: impl Into<String>) -> Self {
        Self {
            service_name: "gateway".to_string(),
            log_level: "info".to_string(),
            port: 8000,
            auth_service_url: auth_service_url.into(),
            internal_token_secret: internal_token_secret.into(),
            internal_token_ttl_seconds: 300,
            token_cache_ttl_seconds: 300,
            services: HashMap::new(),
            cache_bypass_services: Vec::new(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let config = GatewayConfig {
            service_name: get_env("SERVICE_NAME", "gateway"),
            log_level: get_env("LOG_LEVEL", "info"),
            port: parse_env("PORT", "8000")?,
            auth_service_url: get_env("AUTH_SERVICE_URL", "http://localhost:8080"),
            internal_token_secret: get_env("JWT_SECRET", "dev-only-insecure-secret"),
            internal_token_ttl_seconds: parse_env("INTERNAL_TOKEN_TTL_SECONDS", "300")?,
            token_cache_ttl_seconds: parse_env("TOKEN_CACHE_TTL_SECONDS", "300")?,
            services: parse_service_routes(&env::var("SERVICE_ROUTES").unwrap_or_default())?,
            cache_bypass_services: env::var("CACHE_BYPASS_SERVICES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        };

        if config.token_cache_ttl_seconds > 300 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_CACHE_TTL_SECONDS must not exceed 300"
            )));
        }

        Ok(config)
    }

    pub fn service_url(&self, name: &str) -> Option<&str> {
        self.services.get(name).map(String::as_str)
    }

    pub fn register_service(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.services.insert(name.into(), url.into());
    }

    pub fn bypasses_cache(&self, service: &str) -> bool {
        self.cache_bypass_services.iter().any(|s| s == service)
    }

    pub fn mark_cache_bypass(&mut self, service: impl Into<String>) {
        self.cache_bypass_services.push(service.into());
    }
}

/// `SERVICE_ROUTES` is a comma-separated list of `name=url` pairs, e.g.
/// `billing=http://billing:8080,file-service=http://files:8080`.
fn parse_service_routes(raw: &str) -> Result<HashMap<String, String>, AppError> {
    let mut services = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = entry.split_once('=').ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid SERVICE_ROUTES entry (expected name=url): {}",
                entry
            ))
        })?;
        services.insert(name.trim().to_string(), url.trim().to_string());
    }
    Ok(services)
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, default).parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_routes() {
        let services =
            parse_service_routes("billing=http://billing:8080, file-service=http://files:8080")
                .unwrap();
        assert_eq!(services["billing"], "http://billing:8080");
        assert_eq!(services["file-service"], "http://files:8080");
    }

    #[test]
    fn rejects_malformed_route_entries() {
        assert!(parse_service_routes("billing").is_err());
    }

    #[test]
    fn empty_routes_are_fine() {
        assert!(parse_service_routes("").unwrap().is_empty());
    }
}
