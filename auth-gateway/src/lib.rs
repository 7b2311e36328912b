pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::GatewayConfig;
use crate::middleware::{auth_middleware, API_TOKEN_HEADER};
use crate::services::{Access, AuthService, CredentialResolver, EmailProvider, IdentityStore, TokenCodec};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::login,
        handlers::auth::identity,
        handlers::auth::request_password_reset,
        handlers::auth::accept_invite,
        handlers::user::get_user,
        handlers::user::update_user,
        handlers::user::update_password,
        handlers::user::set_super_admin,
        handlers::organisation::create_organisation,
        handlers::organisation::get_organisation,
        handlers::organisation::update_organisation,
        handlers::organisation::list_organisations,
        handlers::organisation::deactivate_organisation,
        handlers::organisation::organisation_users,
        handlers::organisation::provision_member,
        handlers::organisation::remove_user,
        handlers::organisation::set_admin,
        handlers::organisation::invite_user,
        handlers::organisation::resend_invite,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            models::LoginRequest,
            models::LoginOptions,
            models::OrganisationToken,
            models::PasswordResetRequest,
            models::IdentityResponse,
            models::CredentialSource,
            models::UserResponse,
            models::UpdateUserRequest,
            models::PasswordChangeRequest,
            models::SuperAdminStatusRequest,
            models::Organisation,
            models::CreateOrganisationRequest,
            models::UpdateOrganisationRequest,
            models::OrganisationUser,
            models::MembershipState,
            models::InviteRequest,
            models::ResendInviteRequest,
            models::InviteResponse,
            models::AdminStatusRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, identity and password reset"),
        (name = "User", description = "User profile management"),
        (name = "Organisations", description = "Organisations, members and invites"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_TOKEN_HEADER))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub auth: AuthService,
    pub resolver: CredentialResolver,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the services for `config` on top of the given store and mailer.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn IdentityStore>,
        email: Arc<dyn EmailProvider>,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, anyhow::Error> {
        let codec = TokenCodec::new(&config.token.secret, config.token.leeway_seconds)?;
        let resolver = CredentialResolver::new(
            codec.clone(),
            config.api.keys.clone(),
            config.api.service_account_id,
        );
        let auth = AuthService::new(
            store,
            codec,
            config.token.clone(),
            email,
            config.email.base_url.clone(),
        );

        Ok(Self {
            config,
            auth,
            resolver,
            metrics,
        })
    }
}

/// Routes in `routes` only run once the caller satisfies `access`.
fn protected(state: &AppState, access: Access, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(from_fn_with_state((state.clone(), access), auth_middleware))
}

pub fn build_router(state: AppState) -> Router {
    let credential_update = protected(
        &state,
        Access::CredentialUpdate,
        Router::new().route("/auth/user/password", patch(handlers::update_password)),
    );

    let invite_redemption = protected(
        &state,
        Access::InviteRedemption,
        Router::new().route("/auth/organisation/invite/accept", post(handlers::accept_invite)),
    );

    let authenticated = protected(
        &state,
        Access::Authenticated,
        Router::new()
            .route("/auth/identity", get(handlers::identity))
            .route("/auth/user", get(handlers::get_user).patch(handlers::update_user)),
    );

    let organisation = protected(
        &state,
        Access::Organisation,
        Router::new()
            .route("/auth/organisation", get(handlers::get_organisation))
            .route("/auth/organisation/users", get(handlers::organisation_users)),
    );

    let organisation_admin = protected(
        &state,
        Access::OrganisationAdmin,
        Router::new()
            .route("/auth/organisation", patch(handlers::update_organisation))
            .route("/auth/organisation/users/:user_id", delete(handlers::remove_user))
            .route("/auth/organisation/users/:user_id/admin", patch(handlers::set_admin))
            .route("/auth/organisation/invite", post(handlers::invite_user))
            .route("/auth/organisation/invite/resend", post(handlers::resend_invite)),
    );

    let super_admin = protected(
        &state,
        Access::SuperAdmin,
        Router::new()
            .route("/auth/organisation", post(handlers::create_organisation))
            .route("/auth/organisations", get(handlers::list_organisations))
            .route(
                "/auth/organisations/:organisation_id",
                delete(handlers::deactivate_organisation),
            )
            .route("/auth/users/:user_id/super-admin", patch(handlers::set_super_admin)),
    );

    let api_only = protected(
        &state,
        Access::ApiOnly,
        Router::new().route("/auth/organisation/users", post(handlers::provision_member)),
    );

    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/auth/login", post(handlers::login))
        .route("/auth/request-password-reset", post(handlers::request_password_reset))
        .merge(credential_update)
        .merge(invite_redemption)
        .merge(authenticated)
        .merge(organisation)
        .merge(organisation_admin)
        .merge(super_admin)
        .merge(api_only)
        .with_state(state)
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
            )
        }))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(%origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_TOKEN_HEADER),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.auth.store().health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Identity store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
