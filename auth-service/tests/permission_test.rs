mod common;

use axum::http::StatusCode;
use common::{TestApp, TEST_PASSWORD};

use auth_service::services::CredentialStore;

#[tokio::test]
async fn resource_wildcard_grants_actions_within_resource_only() {
    let app = TestApp::spawn();
    app.seed_role("admin", Some("acme"), &["user.*"]).await;

    let body = app.register_user("alice@example.com", "acme").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    app.state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["admin".to_string()])
        .await
        .unwrap();

    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.read")
        .await
        .unwrap());
    assert!(!app
        .state
        .permissions
        .check_permission(&user_id, "acme", "billing.read")
        .await
        .unwrap());
}

#[tokio::test]
async fn super_admin_star_matches_everything() {
    let app = TestApp::spawn();
    app.seed_role("super", None, &["*"]).await;

    let body = app.register_user("root@example.com", "acme").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    app.state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["super".to_string()])
        .await
        .unwrap();

    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.read")
        .await
        .unwrap());
    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "billing.read")
        .await
        .unwrap());
}

#[tokio::test]
async fn validate_endpoint_carries_resolved_permissions() {
    let app = TestApp::spawn();
    app.seed_role("editor", Some("acme"), &["document.read", "document.write"])
        .await;

    let (status, body) = app
        .post(
            "/api/v1/auth/register",
            serde_json::json!({
                "email": "ed@example.com",
                "password": TEST_PASSWORD,
                "tenant_id": "acme",
                "roles": ["editor"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            "/api/v1/auth/validate",
            serde_json::json!({ "token": body["access_token"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let permissions: Vec<String> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap().to_string())
        .collect();
    assert!(permissions.contains(&"document.read".to_string()));
    assert!(permissions.contains(&"document.write".to_string()));
}

#[tokio::test]
async fn role_removal_takes_effect_after_invalidation() {
    let app = TestApp::spawn();
    app.seed_role("admin", Some("acme"), &["user.*"]).await;
    app.seed_role("viewer", Some("acme"), &["user.read"]).await;

    let body = app.register_user("alice@example.com", "acme").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    app.state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["admin".to_string()])
        .await
        .unwrap();

    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.delete")
        .await
        .unwrap());

    // update_user_roles invalidates the pair's cache entry itself.
    app.state
        .auth
        .update_user_roles(&user_id, "acme", &["viewer".to_string()])
        .await
        .unwrap();

    assert!(!app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.delete")
        .await
        .unwrap());
    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.read")
        .await
        .unwrap());
}

#[tokio::test]
async fn membership_removal_empties_the_permission_set() {
    let app = TestApp::spawn();
    app.seed_role("admin", Some("acme"), &["user.*"]).await;

    let body = app.register_user("alice@example.com", "acme").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    app.state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["admin".to_string()])
        .await
        .unwrap();
    assert!(app
        .state
        .permissions
        .check_permission(&user_id, "acme", "user.read")
        .await
        .unwrap());

    app.state
        .auth
        .remove_user_from_tenant(&user_id, "acme")
        .await
        .unwrap();

    assert!(app
        .state
        .permissions
        .get_user_permissions(&user_id, "acme")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn add_membership_is_idempotent_on_user_and_tenant() {
    let app = TestApp::spawn();
    let body = app.register_user("alice@example.com", "acme").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let first = app
        .state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["user".to_string()])
        .await
        .unwrap();
    let second = app
        .state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["user".to_string()])
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.roles, vec!["user".to_string()]);

    // Different roles replace.
    let third = app
        .state
        .auth
        .add_user_to_tenant(&user_id, "acme", &["admin".to_string()])
        .await
        .unwrap();
    assert_eq!(third.id, first.id);
    assert_eq!(third.roles, vec!["admin".to_string()]);

    let memberships = app.store.find_memberships_for_user(&user_id).await.unwrap();
    assert_eq!(memberships.len(), 1);
}
