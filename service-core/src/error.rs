use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable sub-reason attached to 403 responses so that clients can
/// distinguish the policy that blocked them without the server leaking
/// anything about credentials.
#[derive(Debug, Clone, PartialEq)]
pub enum ForbiddenReason {
    /// Account is locked out; carries the seconds until the lock releases.
    Locked { retry_after_seconds: i64 },
    AccountDeactivated,
    NoTenantAccess,
    IdentifierTypeNotAllowed,
    RegistrationDisabled,
}

impl std::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl ForbiddenReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForbiddenReason::Locked { .. } => "locked",
            ForbiddenReason::AccountDeactivated => "account_deactivated",
            ForbiddenReason::NoTenantAccess => "no_tenant_access",
            ForbiddenReason::IdentifierTypeNotAllowed => "identifier_type_not_allowed",
            ForbiddenReason::RegistrationDisabled => "registration_disabled",
        }
    }

    fn message(&self) -> String {
        match self {
            ForbiddenReason::Locked {
                retry_after_seconds,
            } => format!(
                "Account is temporarily locked. Try again in {} seconds",
                retry_after_seconds
            ),
            ForbiddenReason::AccountDeactivated => "User account is deactivated".to_string(),
            ForbiddenReason::NoTenantAccess => {
                "User does not have access to this tenant".to_string()
            }
            ForbiddenReason::IdentifierTypeNotAllowed => {
                "Login with this identifier type is not allowed for this tenant".to_string()
            }
            ForbiddenReason::RegistrationDisabled => {
                "Registration is not allowed for this tenant".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Password policy violation: {0}")]
    PolicyViolation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(ForbiddenReason),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Cache error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Generic credential failure. User-not-found and bad-password must be
    /// indistinguishable, so every call site uses this single constructor.
    pub fn invalid_credentials() -> Self {
        AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
    }

    pub fn invalid_token() -> Self {
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    }
}

impl From<ForbiddenReason> for AppError {
    fn from(reason: ForbiddenReason) -> Self {
        AppError::Forbidden(reason)
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            reason: Option<&'static str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            retry_after_seconds: Option<u64>,
        }

        let (status, error_message, reason, retry_after) = match &self {
            AppError::ValidationError(err) => (
                StatusCode::BAD_REQUEST,
                format!("Validation error: {}", err),
                None,
                None,
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None, None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None, None),
            AppError::PolicyViolation(rule) => (
                StatusCode::BAD_REQUEST,
                rule.clone(),
                Some("policy_violation"),
                None,
            ),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err.to_string(), None, None),
            AppError::Forbidden(fr) => {
                let retry = match fr {
                    ForbiddenReason::Locked {
                        retry_after_seconds,
                    } => Some((*retry_after_seconds).max(0) as u64),
                    _ => None,
                };
                (
                    StatusCode::FORBIDDEN,
                    fr.message(),
                    Some(fr.as_str()),
                    retry,
                )
            }
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::TooManyRequests(msg, retry) => {
                (StatusCode::TOO_MANY_REQUESTS, msg.clone(), None, *retry)
            }
            AppError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
                None,
                None,
            ),
            AppError::BadGateway(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Bad Gateway: {}", msg),
                None,
                None,
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
                None,
                None,
            ),
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::RedisError(_)
            | AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let mut res = (
            status,
            Json(ErrorResponse {
                error: error_message,
                reason,
                retry_after_seconds: retry_after,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_reason_carries_retry_after() {
        let err = AppError::Forbidden(ForbiddenReason::Locked {
            retry_after_seconds: 900,
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::RETRY_AFTER)
                .unwrap(),
            "900"
        );
    }

    #[test]
    fn invalid_credentials_is_generic() {
        let not_found = AppError::invalid_credentials();
        let bad_password = AppError::invalid_credentials();
        assert_eq!(not_found.to_string(), bad_password.to_string());
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::InternalError(anyhow::anyhow!("pool exhausted at 10.0.0.3"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
