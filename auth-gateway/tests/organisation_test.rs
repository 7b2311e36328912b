//! Organisation management and membership administration.

mod common;

use axum::http::{Method, StatusCode};
use common::{Credential, TestApp, TEST_API_KEY, TEST_PASSWORD};
use serde_json::json;

fn create_body(short_name: &str) -> serde_json::Value {
    json!({
        "display_name": "Fact Checkers",
        "short_name": short_name,
        "country_codes": ["GBR", "IRL"],
        "language": "en",
    })
}

#[tokio::test]
async fn operator_creates_lists_and_deactivates_organisations() {
    // Arrange
    let app = TestApp::new();

    // Act: create
    let (status, created) = app
        .request(
            Method::POST,
            "/auth/organisation",
            Credential::ApiToken(TEST_API_KEY),
            Some(create_body("checkers")),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["short_name"], "checkers");
    assert_eq!(created["country_codes"], json!(["GBR", "IRL"]));
    assert!(created.get("deactivated").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::POST,
            "/auth/organisation",
            Credential::ApiToken(TEST_API_KEY),
            Some(create_body("checkers")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listed) = app
        .request(Method::GET, "/auth/organisations", Credential::ApiToken(TEST_API_KEY), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Act: deactivate
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/auth/organisations/{}", id),
            Credential::ApiToken(TEST_API_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = app
        .request(Method::GET, "/auth/organisations", Credential::ApiToken(TEST_API_KEY), None)
        .await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/auth/organisations/{}", id),
            Credential::ApiToken(TEST_API_KEY),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_validates_fields() {
    let app = TestApp::new();

    for body in [
        json!({ "display_name": "X", "short_name": "ok", "country_codes": ["GBR"], "language": "en" }),
        json!({ "display_name": "Good", "short_name": "Not Valid", "country_codes": ["GBR"], "language": "en" }),
        json!({ "display_name": "Good", "short_name": "ok", "country_codes": [], "language": "en" }),
        json!({ "display_name": "Good", "short_name": "ok", "country_codes": ["gb"], "language": "en" }),
        json!({ "display_name": "Good", "short_name": "ok", "country_codes": ["GBR"], "language": "english" }),
    ] {
        let (status, _) = app
            .request(
                Method::POST,
                "/auth/organisation",
                Credential::ApiToken(TEST_API_KEY),
                Some(body.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", body);
    }
}

#[tokio::test]
async fn organisation_admin_updates_own_organisation() {
    // Arrange
    let app = TestApp::new();
    let (organisation, _, token) = app.admin_session("updaters").await;

    // Act
    let (status, body) = app
        .request(
            Method::PATCH,
            "/auth/organisation",
            Credential::Bearer(&token),
            Some(json!({ "display_name": "Renamed Org", "language": "fr" })),
        )
        .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], organisation.id.to_string());
    assert_eq!(body["display_name"], "Renamed Org");
    assert_eq!(body["language"], "fr");
    assert_eq!(body["short_name"], "updaters");

    let (_, fetched) = app
        .request(Method::GET, "/auth/organisation", Credential::Bearer(&token), None)
        .await;
    assert_eq!(fetched["display_name"], "Renamed Org");
}

#[tokio::test]
async fn admin_flag_changes_apply_at_next_login() {
    // Arrange
    let app = TestApp::new();
    let (organisation, _, admin_token) = app.admin_session("promoters").await;
    let member = app.seed_user("member@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&member, &organisation, false).await;

    // Act
    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/auth/organisation/users/{}/admin", member.id),
            Credential::Bearer(&admin_token),
            Some(json!({ "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Assert
    let (_, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "member@example.org", "password": TEST_PASSWORD })),
        )
        .await;
    assert_eq!(
        body["organisations"][organisation.id.to_string()]["is_organisation_admin"],
        true
    );

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/auth/organisation/users/{}/admin", uuid::Uuid::new_v4()),
            Credential::Bearer(&admin_token),
            Some(json!({ "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn removed_member_loses_the_organisation_at_login() {
    // Arrange
    let app = TestApp::new();
    let (organisation, _, admin_token) = app.admin_session("removers").await;
    let other = app.seed_organisation("elsewhere").await;
    let member = app.seed_user("leaver@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&member, &organisation, false).await;
    app.add_member(&member, &other, false).await;

    // Act
    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/auth/organisation/users/{}", member.id),
            Credential::Bearer(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Assert
    let (_, body) = app
        .request(
            Method::POST,
            "/auth/login",
            Credential::None,
            Some(json!({ "email": "leaver@example.org", "password": TEST_PASSWORD })),
        )
        .await;
    let organisations = body["organisations"].as_object().unwrap();
    assert_eq!(organisations.len(), 1);
    assert!(organisations.contains_key(&other.id.to_string()));

    let (_, users) = app
        .request(
            Method::GET,
            "/auth/organisation/users",
            Credential::Bearer(&admin_token),
            None,
        )
        .await;
    assert!(users
        .as_array()
        .unwrap()
        .iter()
        .all(|u| u["email"] != "leaver@example.org"));
}

#[tokio::test]
async fn members_can_read_but_not_administer() {
    // Arrange
    let app = TestApp::new();
    let (organisation, admin, _) = app.admin_session("readers").await;
    let member = app.seed_user("reader@example.org", Some(TEST_PASSWORD)).await;
    app.add_member(&member, &organisation, false).await;
    let token = app
        .session_token("reader@example.org", TEST_PASSWORD, &organisation)
        .await;

    // Act
    let (read_status, users) = app
        .request(
            Method::GET,
            "/auth/organisation/users",
            Credential::Bearer(&token),
            None,
        )
        .await;
    let (remove_status, _) = app
        .request(
            Method::DELETE,
            &format!("/auth/organisation/users/{}", admin.id),
            Credential::Bearer(&token),
            None,
        )
        .await;
    let (invite_status, _) = app
        .request(
            Method::POST,
            "/auth/organisation/invite",
            Credential::Bearer(&token),
            Some(json!({ "user_email": "friend@example.org" })),
        )
        .await;

    // Assert
    assert_eq!(read_status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert_eq!(remove_status, StatusCode::FORBIDDEN);
    assert_eq!(invite_status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_profile_round_trip() {
    let app = TestApp::new();
    let (_, admin, token) = app.admin_session("profiles").await;

    let (status, body) = app
        .request(
            Method::PATCH,
            "/auth/user",
            Credential::Bearer(&token),
            Some(json!({ "display_name": "  Ada Admin " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Ada Admin");

    let (status, body) = app
        .request(Method::GET, "/auth/user", Credential::Bearer(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], admin.id.to_string());
    assert_eq!(body["display_name"], "Ada Admin");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn operator_grants_super_admin() {
    let app = TestApp::new();
    let user = app.seed_user("promoted@example.org", None).await;

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/auth/users/{}/super-admin", user.id),
            Credential::ApiToken(TEST_API_KEY),
            Some(json!({ "is_super_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(
            Method::PATCH,
            &format!("/auth/users/{}/super-admin", uuid::Uuid::new_v4()),
            Credential::ApiToken(TEST_API_KEY),
            Some(json!({ "is_super_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = TestApp::new();

    let (status, body) = app.request(Method::GET, "/health", Credential::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "auth-gateway-test");

    let (status, body) = app
        .request(Method::GET, "/.well-known/openapi.json", Credential::None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/auth/login").is_some());
    assert!(body["components"]["securitySchemes"].get("api_token").is_some());
}
