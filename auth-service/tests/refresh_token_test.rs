mod common;

use axum::http::StatusCode;
use common::TestApp;

use auth_service::services::CredentialStore;

async fn validate(app: &TestApp, token: &str) -> (StatusCode, serde_json::Value) {
    app.post(
        "/api/v1/auth/validate",
        serde_json::json!({ "token": token }),
    )
    .await
}

async fn refresh(app: &TestApp, token: &str) -> (StatusCode, serde_json::Value) {
    app.post(
        "/api/v1/auth/refresh",
        serde_json::json!({ "refresh_token": token }),
    )
    .await
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let app = TestApp::spawn();
    let first = app.register_user("alice@example.com", "acme").await;
    let r1 = first["refresh_token"].as_str().unwrap();
    let a1 = first["access_token"].as_str().unwrap();

    // R1 -> (A2, R2)
    let (status, second) = refresh(&app, r1).await;
    assert_eq!(status, StatusCode::OK);
    let r2 = second["refresh_token"].as_str().unwrap();
    let a2 = second["access_token"].as_str().unwrap();
    assert_ne!(r1, r2);
    assert_ne!(a1, a2);

    // A1 keeps validating until its own session TTL.
    let (status, _) = validate(&app, a1).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = validate(&app, a2).await;
    assert_eq!(status, StatusCode::OK);

    // Replaying R1 fails; R2 still rotates.
    let (status, _) = refresh(&app, r1).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, third) = refresh(&app, r2).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(third["refresh_token"].as_str().unwrap(), r2);
}

#[tokio::test]
async fn refresh_rejects_garbage_and_wrong_token_types() {
    let app = TestApp::spawn();
    let pair = app.register_user("alice@example.com", "acme").await;

    let (status, _) = refresh(&app, "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // An opaque access token is not a refresh token.
    let access = pair["access_token"].as_str().unwrap();
    let (status, _) = refresh(&app, access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_fails_after_membership_revocation() {
    let app = TestApp::spawn();
    let pair = app.register_user("alice@example.com", "acme").await;
    let user_id = pair["user"]["id"].as_str().unwrap().to_string();

    app.store.deactivate_membership(&user_id, "acme").await.unwrap();

    let (status, body) = refresh(&app, pair["refresh_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "no_tenant_access");
}

#[tokio::test]
async fn validate_returns_claims_for_live_sessions() {
    let app = TestApp::spawn();
    let pair = app.register_user("alice@example.com", "acme").await;

    let (status, body) = validate(&app, pair["access_token"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["roles"][0], "user");

    let (status, _) = validate(&app, "bogus-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_kills_session_and_refresh_credential() {
    let app = TestApp::spawn();
    let pair = app.register_user("alice@example.com", "acme").await;
    let access = pair["access_token"].as_str().unwrap();
    let refresh_token = pair["refresh_token"].as_str().unwrap();

    let (status, _) = app
        .post_with_auth("/api/v1/auth/logout", access, serde_json::Value::Null)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The session store is authoritative: rejection is immediate.
    let (status, _) = validate(&app, access).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = refresh(&app, refresh_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_requires_a_bearer() {
    let app = TestApp::spawn();
    let (status, _) = app
        .post("/api/v1/auth/logout", serde_json::Value::Null)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
