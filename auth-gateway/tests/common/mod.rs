//! Shared harness for the gateway integration tests.
//!
//! Requests go straight through the router with `oneshot`, backed by the
//! in-memory identity store and the recording mailer.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use auth_gateway::{
    build_router,
    config::GatewayConfig,
    models::{Claims, CreateOrganisationRequest, Membership, Organisation, User},
    services::{IdentityStore, InMemoryStore, MockEmailService, SentEmail, TokenCodec},
    utils::{hash_password, Password},
    AppState,
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const TEST_API_KEY: &str = "test-operator-key-12345";
pub const TEST_SECRET: &str = "integration-test-signing-secret";
pub const TEST_PASSWORD: &str = "correct horse battery staple";
pub const SERVICE_ACCOUNT_ID: &str = "7f1d2c3b-0000-4000-8000-000000000001";

/// How a test request authenticates.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    None,
    Bearer(&'a str),
    ApiToken(&'a str),
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub email: Arc<MockEmailService>,
}

pub fn test_config() -> GatewayConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("JWT_SECRET", TEST_SECRET.to_string()),
        ("API_KEYS", format!("[\"{}\"]", TEST_API_KEY)),
        ("API_SERVICE_ACCOUNT_ID", SERVICE_ACCOUNT_ID.to_string()),
        ("SERVICE_NAME", "auth-gateway-test".to_string()),
        ("LOG_LEVEL", "error".to_string()),
        ("APP_BASE_URL", "https://app.example.org".to_string()),
    ]);

    GatewayConfig::from_source(service_core::config::Config::default(), |key| {
        vars.get(key).cloned()
    })
    .expect("test config should be valid")
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let state = AppState::new(test_config(), store.clone(), email.clone(), None)
            .expect("Failed to build app state");

        Self {
            router: build_router(state.clone()),
            state,
            store,
            email,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        credential: Credential<'_>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match credential {
            Credential::None => builder,
            Credential::Bearer(token) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", token))
            }
            Credential::ApiToken(key) => builder.header("x-api-token", key),
        };

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Insert a user directly. The credential, when given, is dated a day
    /// back so reset tokens minted during the test postdate it.
    pub async fn seed_user(&self, email: &str, password: Option<&str>) -> User {
        let mut user = User::new(email);
        if let Some(password) = password {
            let hash = hash_password(&Password::new(password.to_string())).unwrap();
            user.password_hash = Some(hash.into_string());
            user.password_last_updated = Some(Utc::now() - chrono::Duration::days(1));
        }
        self.store.create_user(&user).await.unwrap();
        user
    }

    pub async fn seed_organisation(&self, short_name: &str) -> Organisation {
        let organisation = Organisation::new(CreateOrganisationRequest {
            display_name: format!("Organisation {}", short_name),
            short_name: short_name.to_string(),
            country_codes: vec!["GBR".to_string()],
            language: "en".to_string(),
        });
        self.store.create_organisation(&organisation).await.unwrap();
        organisation
    }

    pub async fn add_member(&self, user: &User, organisation: &Organisation, is_admin: bool) {
        self.store
            .create_membership(&Membership::accepted(user.id, organisation.id, is_admin))
            .await
            .unwrap();
    }

    /// Log in and return the session token for `organisation`.
    pub async fn session_token(&self, email: &str, password: &str, organisation: &Organisation) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/login",
                Credential::None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        body["organisations"][organisation.id.to_string()]["token"]
            .as_str()
            .expect("no token for organisation")
            .to_string()
    }

    /// A seeded organisation plus an admin of it, already logged in.
    pub async fn admin_session(&self, short_name: &str) -> (Organisation, User, String) {
        let organisation = self.seed_organisation(short_name).await;
        let admin = self
            .seed_user(&format!("admin@{}.example.org", short_name), Some(TEST_PASSWORD))
            .await;
        self.add_member(&admin, &organisation, true).await;
        let token = self.session_token(&admin.email, TEST_PASSWORD, &organisation).await;
        (organisation, admin, token)
    }

    /// Wait for the background mailer to deliver `count` messages.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<SentEmail> {
        for _ in 0..100 {
            let sent = self.email.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} emails, got {:?}",
            count,
            self.email.sent()
        );
    }
}

/// Sign arbitrary claims with the test secret.
pub fn mint(claims: &Claims) -> String {
    TokenCodec::new(TEST_SECRET, 0).unwrap().mint(claims).unwrap()
}

pub fn service_account_id() -> Uuid {
    SERVICE_ACCOUNT_ID.parse().unwrap()
}
