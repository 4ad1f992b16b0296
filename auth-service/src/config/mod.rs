use serde::Deserialize;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub mongodb: MongoConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub addr: String,
    pub password: Option<String>,
    pub db: u32,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}/{}", password, self.addr, self.db),
            None => format!("redis://{}/{}", self.addr, self.db),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret for refresh, MFA and internal tokens.
    pub secret: String,
    /// Session TTL used when a tenant config does not carry one.
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub login_per_minute: u32,
    pub register_per_hour: u32,
    pub refresh_per_minute: u32,
    pub oauth_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<OAuthProviderConfig>,
    pub github: Option<OAuthProviderConfig>,
}

/// Credentials for the external provider handshake. The core never touches
/// them; they are plumbed through to the OAuth collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: parse_env("PORT", Some("8080"), is_prod)?,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("mongodb://localhost:27017"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("auth"), is_prod)?,
                min_pool_size: parse_env("MONGODB_MIN_POOL_SIZE", Some("10"), is_prod)?,
                max_pool_size: parse_env("MONGODB_MAX_POOL_SIZE", Some("100"), is_prod)?,
            },
            redis: RedisConfig {
                addr: get_env("REDIS_ADDR", Some("localhost:6379"), is_prod)?,
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                db: parse_env("REDIS_DB", Some("0"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", Some("dev-only-insecure-secret"), is_prod)?,
                access_ttl_minutes: parse_env("JWT_ACCESS_TTL", Some("60"), is_prod)?,
                refresh_ttl_days: parse_env("JWT_REFRESH_TTL", Some("7"), is_prod)?,
            },
            rate_limit: RateLimitConfig {
                login_per_minute: parse_env("RATE_LIMIT_LOGIN_PER_MINUTE", Some("5"), is_prod)?,
                register_per_hour: parse_env("RATE_LIMIT_REGISTER_PER_HOUR", Some("3"), is_prod)?,
                refresh_per_minute: parse_env("RATE_LIMIT_REFRESH_PER_MINUTE", Some("10"), is_prod)?,
                oauth_per_minute: parse_env("RATE_LIMIT_OAUTH_PER_MINUTE", Some("5"), is_prod)?,
            },
            oauth: OAuthConfig {
                google: load_provider("GOOGLE"),
                github: load_provider("GITHUB"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }
        if self.jwt.refresh_ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TTL must be positive"
            )));
        }
        if self.jwt.access_ttl_minutes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TTL must be positive"
            )));
        }
        if self.mongodb.min_pool_size > self.mongodb.max_pool_size {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MONGODB_MIN_POOL_SIZE cannot exceed MONGODB_MAX_POOL_SIZE"
            )));
        }
        if self.environment == Environment::Prod && self.jwt.secret == "dev-only-insecure-secret" {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be set in production"
            )));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

fn load_provider(prefix: &str) -> Option<OAuthProviderConfig> {
    let client_id = env::var(format!("{}_CLIENT_ID", prefix)).ok()?;
    let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok()?;
    let redirect_url = env::var(format!("{}_REDIRECT_URL", prefix)).ok()?;
    Some(OAuthProviderConfig {
        client_id,
        client_secret,
        redirect_url,
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_with_and_without_password() {
        let mut config = RedisConfig {
            addr: "localhost:6379".to_string(),
            password: None,
            db: 2,
        };
        assert_eq!(config.url(), "redis://localhost:6379/2");

        config.password = Some("hunter2".to_string());
        assert_eq!(config.url(), "redis://:hunter2@localhost:6379/2");
    }
}
