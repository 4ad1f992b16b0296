use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::services::ValidatedToken;
use crate::AppState;

/// The raw bearer string, kept around for logout.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Middleware for bearer-protected routes. Full validation: session
/// lookup, expiry, and the user/membership recheck.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?
        .to_string();

    let validated = state.tokens.verify_token(&token).await?;

    req.extensions_mut().insert(validated);
    req.extensions_mut().insert(BearerToken(token));

    Ok(next.run(req).await)
}

/// Extractor for the validated claims placed by [`auth_middleware`].
pub struct AuthUser(pub ValidatedToken);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<ValidatedToken>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
        })?;
        Ok(AuthUser(claims.clone()))
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<BearerToken>().cloned().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Bearer token missing from request extensions"))
        })
    }
}
