//! Login and organisation selection.

mod common;

use axum::http::{Method, StatusCode};
use common::{Credential, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_returns_one_scoped_token_per_organisation() {
    // Arrange
    let app = TestApp::new();
    let first = app.seed_organisation("first").await;
    let second = app.seed_organisation("second").await;
    let user = app.seed_user("member@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&user, &first, true).await;
    app.add_member(&user, &second, false).await;

    // Act
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "member@example.org", "password": TEST_PASSWORD })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["first_time_setup"], false);

    let organisations = body["organisations"].as_object().unwrap();
    assert_eq!(organisations.len(), 2);

    let first_token = organisations[&first.id.to_string()]["token"].as_str().unwrap();
    let second_token = organisations[&second.id.to_string()]["token"].as_str().unwrap();
    assert_ne!(first_token, second_token);
    assert_eq!(organisations[&first.id.to_string()]["is_organisation_admin"], true);
    assert_eq!(organisations[&second.id.to_string()]["is_organisation_admin"], false);

    // Each token resolves to the organisation it is keyed by.
    for (organisation_id, entry) in organisations {
        let token = entry["token"].as_str().unwrap();
        let (status, identity) = app
            .request(Method::GET, "/auth/identity", Credential::Bearer(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(identity["organisation_id"], organisation_id.as_str());
        assert_eq!(identity["user_id"], user.id.to_string());
        assert_eq!(identity["source"], "bearer_token");
    }
}

#[tokio::test]
async fn login_email_is_case_insensitive() {
    let app = TestApp::new();
    let organisation = app.seed_organisation("casing").await;
    let user = app.seed_user("Mixed.Case@Example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&user, &organisation, false).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "mixed.case@example.ORG", "password": TEST_PASSWORD })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_email_and_wrong_password_are_indistinguishable() {
    // Arrange
    let app = TestApp::new();
    let organisation = app.seed_organisation("acme").await;
    let user = app.seed_user("known@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&user, &organisation, false).await;

    // Act
    let wrong_password = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "known@example.org", "password": "not the password" })),
        )
        .await;
    let unknown_email = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "nobody@example.org", "password": TEST_PASSWORD })),
        )
        .await;

    // Assert
    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn user_without_password_cannot_log_in() {
    let app = TestApp::new();
    let organisation = app.seed_organisation("invited").await;
    let user = app.seed_user("pending@example.org", None).await;
    app.add_member(&user, &organisation, false).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "pending@example.org", "password": "" })),
        )
        .await;

    // An empty password fails request validation before any lookup.
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "pending@example.org", "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_without_active_organisations_is_rejected() {
    // Arrange
    let app = TestApp::new();
    let organisation = app.seed_organisation("closing").await;
    let user = app.seed_user("lonely@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&user, &organisation, false).await;
    app.state.auth.deactivate_organisation(organisation.id).await.unwrap();

    // Act
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "lonely@example.org", "password": TEST_PASSWORD })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "user does not belong to any organisations");
}

#[tokio::test]
async fn super_admin_is_offered_every_active_organisation() {
    // Arrange
    let app = TestApp::new();
    let home = app.seed_organisation("home").await;
    let other = app.seed_organisation("other").await;
    let closed = app.seed_organisation("closed").await;
    app.state.auth.deactivate_organisation(closed.id).await.unwrap();

    let admin = app.seed_user("root@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&admin, &home, false).await;
    app.state.auth.set_super_admin(admin.id, true).await.unwrap();

    // Act
    let (status, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "root@example.org", "password": TEST_PASSWORD })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    let organisations = body["organisations"].as_object().unwrap();
    assert_eq!(organisations.len(), 2);
    assert!(!organisations.contains_key(&closed.id.to_string()));
    assert_eq!(organisations[&home.id.to_string()]["is_organisation_admin"], true);
    assert_eq!(organisations[&other.id.to_string()]["is_organisation_admin"], true);
    assert_eq!(body["user"]["is_super_admin"], true);
}
