use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::auth::{
    ChangePasswordRequest, LoginConfigResponse, LoginRequest, MembershipResponse,
    MfaCompleteRequest, MfaRequiredResponse, OAuthLoginRequest, RefreshRequest, RegisterRequest,
    ValidateRequest, ValidateResponse,
};
use crate::handlers::ClientIp;
use crate::middleware::{AuthUser, BearerToken};
use crate::services::LoginOutcome;
use crate::AppState;

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let pair = state.auth.register(&req, &ip).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    req.validate()?;
    match state
        .auth
        .login(&req.identifier, &req.password, &req.tenant_id, &ip)
        .await?
    {
        LoginOutcome::Success(pair) => Ok(Json(pair).into_response()),
        LoginOutcome::MfaRequired { mfa_token } => Ok(Json(MfaRequiredResponse {
            mfa_required: true,
            mfa_token,
        })
        .into_response()),
    }
}

/// POST /api/v1/auth/mfa/complete
pub async fn complete_mfa(
    State(state): State<AppState>,
    Json(req): Json<MfaCompleteRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let pair = state.auth.complete_mfa(&req.mfa_token, &req.code).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let pair = state.tokens.refresh_token(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, AppError> {
    state.tokens.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/validate
///
/// The gateway and sibling services call this; failures use the same
/// taxonomy as end-user requests.
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let validated = state.tokens.verify_token(&req.token).await?;
    Ok(Json(ValidateResponse {
        valid: true,
        user_id: validated.user_id,
        tenant_id: validated.tenant_id,
        email: validated.email,
        roles: validated.roles,
        permissions: validated.permissions,
    }))
}

/// POST /api/v1/auth/oauth
pub async fn oauth_login(
    State(state): State<AppState>,
    Json(req): Json<OAuthLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let pair = state.auth.login_with_oauth(&req).await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    state
        .auth
        .change_password(
            &claims.user_id,
            &claims.tenant_id,
            &req.old_password,
            &req.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/tenants
pub async fn list_tenants(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let memberships = state.auth.list_tenants(&claims.user_id).await?;
    let response: Vec<MembershipResponse> =
        memberships.into_iter().map(MembershipResponse::from).collect();
    Ok(Json(response))
}

/// GET /api/v1/auth/login-config/{tenant_id}
///
/// Public so login UIs can render before anyone authenticates. Never 404s;
/// unknown tenants get the sentinel defaults.
pub async fn login_config(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.store.get_tenant_login_config(&tenant_id).await?;
    Ok(Json(LoginConfigResponse::from(config)))
}
