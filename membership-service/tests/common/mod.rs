//! Shared setup for membership-service integration tests.
//!
//! Builds the full router over an in-memory identity store seeded with one
//! account per role.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use membership_service::{
    build_router,
    config::{
        Environment, GateConfig, IdleConfig, MembershipConfig, PersistenceBackend,
        PersistenceConfig, RateLimitConfig, RevocationBackend, RevocationConfig, SecurityConfig,
        SessionConfig, SwaggerConfig, SwaggerMode,
    },
    models::{Identity, IdentityProfile, IdentityStatus, Role},
    services::{
        IdentityStore, InMemoryIdentityStore, InMemoryRevocations, IssuedSession,
        SessionRevocations,
    },
    utils::{hash_password, Password},
    AppState,
};
use secrecy::Secret;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tower::ServiceExt;

pub const COOKIE_NAME: &str = "mapala_session";
pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub const ADMIN_EMAIL: &str = "admin@mapala.ac.id";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const MEMBER_EMAIL: &str = "anggota@mapala.ac.id";
pub const MEMBER_PASSWORD: &str = "anggota123";
pub const APPLICANT_EMAIL: &str = "calon@mapala.ac.id";
pub const APPLICANT_PASSWORD: &str = "calon12345";

pub fn test_config() -> MembershipConfig {
    MembershipConfig {
        common: service_core::config::Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        },
        environment: Environment::Dev,
        service_name: "membership-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        session: SessionConfig {
            secret: Secret::new(TEST_SECRET.to_string()),
            ttl_seconds: 600,
            refresh_after_seconds: 60,
            cookie_name: COOKIE_NAME.to_string(),
            cookie_secure: false,
        },
        idle: IdleConfig {
            timeout_seconds: 600,
            warning_seconds: 60,
        },
        gate: GateConfig {
            login_page: "/auth/login".to_string(),
            unauthorized_page: "/unauthorized".to_string(),
        },
        persistence: PersistenceConfig {
            backend: PersistenceBackend::Postgres,
            database_url: None,
            max_connections: 1,
        },
        revocation: RevocationConfig {
            backend: RevocationBackend::Memory,
            redis_url: None,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            trust_forwarded_for: true,
        },
    }
}

fn identity(id: &str, email: &str, password: &str, role: Role, nim: Option<&str>) -> Identity {
    Identity {
        id: id.to_string(),
        email: email.to_string(),
        display_name: format!("Test {}", role),
        role,
        status: IdentityStatus::Active,
        credential_hash: hash_password(&Password::new(password.to_string()))
            .expect("hash test password")
            .into_string(),
        nim: nim.map(str::to_string),
    }
}

pub fn seeded_store() -> Arc<InMemoryIdentityStore> {
    Arc::new(InMemoryIdentityStore::with_identities([
        identity("admin-1", ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin, None),
        identity(
            "member-1",
            MEMBER_EMAIL,
            MEMBER_PASSWORD,
            Role::Member,
            Some("2021001"),
        ),
        identity(
            "applicant-1",
            APPLICANT_EMAIL,
            APPLICANT_PASSWORD,
            Role::Applicant,
            None,
        ),
    ]))
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryIdentityStore>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: MembershipConfig) -> Self {
        let store = seeded_store();
        let dyn_store: Arc<dyn IdentityStore> = store.clone();
        Self::from_parts(config, dyn_store, store, Arc::new(InMemoryRevocations::new()))
    }

    pub fn with_store(config: MembershipConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self::from_parts(
            config,
            store,
            seeded_store(),
            Arc::new(InMemoryRevocations::new()),
        )
    }

    pub fn with_revocations(revocations: Arc<dyn SessionRevocations>) -> Self {
        let store = seeded_store();
        let dyn_store: Arc<dyn IdentityStore> = store.clone();
        Self::from_parts(test_config(), dyn_store, store, revocations)
    }

    fn from_parts(
        config: MembershipConfig,
        store: Arc<dyn IdentityStore>,
        seeded: Arc<InMemoryIdentityStore>,
        revocations: Arc<dyn SessionRevocations>,
    ) -> Self {
        let state = AppState::new(config, store, revocations, None).expect("build app state");
        let router = build_router(state.clone()).expect("build router");
        Self {
            router,
            state,
            store: seeded,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(token) = cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", COOKIE_NAME, token));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn json(
        &self,
        method: &str,
        path: &str,
        cookie: Option<&str>,
        body: serde_json::Value,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(token) = cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", COOKIE_NAME, token));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Log in through the HTTP surface and return the session token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .json(
                "POST",
                "/auth/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(res.status(), 200, "login for {} failed", email);
        session_cookie_value(&res).expect("login sets the session cookie")
    }

    /// Mint a token directly, bypassing the credential check.
    pub fn token_for(&self, id: &str, email: &str, role: Role) -> String {
        self.session_for(id, email, role).token
    }

    pub fn session_for(&self, id: &str, email: &str, role: Role) -> IssuedSession {
        let profile = IdentityProfile {
            id: id.to_string(),
            email: email.to_string(),
            display_name: "Test".to_string(),
            role,
            nim: None,
        };
        self.state.issuer.issue(&profile).expect("issue token")
    }
}

/// Value of the session cookie set by a response, if any.
pub fn session_cookie_value(res: &Response<Body>) -> Option<String> {
    let prefix = format!("{}=", COOKIE_NAME);
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix(prefix.as_str()))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

pub fn location(res: &Response<Body>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
