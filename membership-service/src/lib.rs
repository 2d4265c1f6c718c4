pub mod authz;
pub mod config;
pub mod dtos;
pub mod handlers;
pub mod idle;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::{request_id, request_id_middleware},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::AuthorizationPolicy;
use crate::config::{Environment, MembershipConfig, SwaggerMode};
use crate::services::{
    AccountService, CredentialVerifier, IdentityStore, SessionIssuer, SessionRevocations,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::session,
        handlers::account::change_password,
        handlers::account::change_email,
        handlers::admin::change_admin_password,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::SessionResponse,
            dtos::auth::IdlePolicyResponse,
            dtos::account::ChangePasswordRequest,
            dtos::account::ChangeEmailRequest,
            dtos::account::ChangeEmailResponse,
            models::IdentityProfile,
            models::Role,
        )
    ),
    tags(
        (name = "Authentication", description = "Login, logout and session lookup"),
        (name = "User", description = "Self-service account changes"),
        (name = "Admin", description = "Administrator operations"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MembershipConfig>,
    pub store: Arc<dyn IdentityStore>,
    pub verifier: CredentialVerifier,
    pub issuer: SessionIssuer,
    pub revocations: Arc<dyn SessionRevocations>,
    pub accounts: AccountService,
    pub policy: Arc<AuthorizationPolicy>,
    pub login_rate_limit: IpRateLimit,
    /// Absent when no process-wide recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire the services around already-constructed backends.
    pub fn new(
        config: MembershipConfig,
        store: Arc<dyn IdentityStore>,
        revocations: Arc<dyn SessionRevocations>,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self, AppError> {
        let issuer = SessionIssuer::new(&config.session)?;
        let login_rate_limit = IpRateLimit::new(
            create_ip_rate_limiter(
                config.rate_limit.login_attempts,
                config.rate_limit.login_window_seconds,
            ),
            config.rate_limit.trust_forwarded_for,
        );

        Ok(Self {
            verifier: CredentialVerifier::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            issuer,
            store,
            revocations,
            policy: Arc::new(AuthorizationPolicy::club_default()),
            login_rate_limit,
            metrics,
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limit.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { axum::Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .merge(login_route)
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/session", get(handlers::auth::session))
        .route("/api/user/password", put(handlers::account::change_password))
        .route("/api/user/email", put(handlers::account::change_email))
        .route(
            "/api/admin/password",
            put(handlers::admin::change_admin_password),
        )
        .fallback(handlers::not_found)
        // Every route, matched or not, passes the authorization gate
        .layer(from_fn_with_state(
            state.clone(),
            middleware::gate_middleware,
        ))
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %request_id(request),
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins)?);

    Ok(app)
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, AppError> {
    // Credentialed CORS cannot be combined with a wildcard origin.
    if allowed_origins.iter().any(|o| o == "*") {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "ALLOWED_ORIGINS must list explicit origins"
        )));
    }

    let origins = allowed_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
        })
        .collect::<Result<Vec<HeaderValue>, AppError>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}
