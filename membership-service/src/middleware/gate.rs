//! Authorization gate.
//!
//! Runs in front of every route: reads the session cookie, asks the
//! [`AuthorizationPolicy`](crate::authz::AuthorizationPolicy) for a decision
//! and either forwards the request or redirects. Denials are always
//! redirects, never bare 401/403 responses. A revoked session counts as no
//! session.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id;

use crate::{
    authz::{Decision, GateState},
    config::{GateConfig, SessionConfig},
    models::Role,
    services::{ServiceError, SessionClaims, SessionError},
    AppState,
};

/// Why a presented cookie did not yield a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaleCookie {
    Expired,
    Malformed,
    Revoked,
}

pub async fn gate_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let session_config = &state.config.session;

    let (gate_state, stale) = match jar.get(&session_config.cookie_name) {
        None => (GateState::Unauthenticated, None),
        Some(cookie) => match state.issuer.validate(cookie.value()) {
            Ok(claims) => match state.revocations.is_revoked(&claims.sid).await {
                Ok(false) => (GateState::Authenticated(claims), None),
                Ok(true) => {
                    tracing::info!(user_id = %claims.sub, "Revoked session presented");
                    (GateState::Unauthenticated, Some(StaleCookie::Revoked))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Session revocation check failed");
                    return AppError::ServiceUnavailable(
                        "session store unavailable".to_string(),
                    )
                    .into_response();
                }
            },
            Err(SessionError::Expired) => {
                (GateState::Unauthenticated, Some(StaleCookie::Expired))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected session cookie");
                (GateState::Unauthenticated, Some(StaleCookie::Malformed))
            }
        },
    };

    let decision = state.policy.decide(&path, &gate_state);
    metrics::counter!("gate_decisions_total", "decision" => decision.as_str()).increment(1);

    match decision {
        Decision::Allow => match gate_state {
            GateState::Authenticated(claims) => {
                let refreshed = match state.issuer.refresh_if_due(&claims) {
                    Ok(refreshed) => refreshed,
                    Err(e) => {
                        tracing::error!(error = %e, user_id = %claims.sub, "Session refresh failed");
                        None
                    }
                };

                req.extensions_mut().insert(claims);
                let mut response = next.run(req).await;
                apply_no_cache(response.headers_mut());

                match refreshed {
                    Some(issued) if !sets_cookie(&response, &session_config.cookie_name) => {
                        let cookie = session_cookie(
                            session_config,
                            issued.token,
                            state.issuer.ttl_seconds(),
                        );
                        (jar.add(cookie), response).into_response()
                    }
                    _ => response,
                }
            }
            GateState::Unauthenticated => {
                let response = next.run(req).await;
                if stale.is_some() && !sets_cookie(&response, &session_config.cookie_name) {
                    (jar.add(removal_cookie(session_config)), response).into_response()
                } else {
                    response
                }
            }
        },
        Decision::RedirectToLogin => {
            let expired = stale == Some(StaleCookie::Expired);
            tracing::info!(
                path = %path,
                request_id = %request_id(&req),
                expired,
                "Gate redirect to login"
            );

            let callback = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or(path.as_str());
            let location = login_location(&state.config.gate, callback, expired);

            let redirect = Redirect::to(&location);
            match stale {
                Some(_) => (jar.add(removal_cookie(session_config)), redirect).into_response(),
                None => redirect.into_response(),
            }
        }
        Decision::RedirectToUnauthorized => {
            tracing::warn!(
                path = %path,
                request_id = %request_id(&req),
                role = ?gate_state.role(),
                "Gate denied: insufficient role"
            );
            Redirect::to(&state.config.gate.unauthorized_page).into_response()
        }
    }
}

/// Login page URL carrying the original location as `callbackUrl`.
pub fn login_location(gate: &GateConfig, callback: &str, expired: bool) -> String {
    let mut location = format!(
        "{}?callbackUrl={}",
        gate.login_page,
        urlencoding::encode(callback)
    );
    if expired {
        location.push_str("&error=SessionExpired");
    }
    location
}

fn apply_no_cache(headers: &mut HeaderMap) {
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Session cookie: HttpOnly, SameSite=Lax, whole-site path.
pub fn session_cookie(config: &SessionConfig, token: String, ttl_seconds: i64) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::seconds(ttl_seconds))
        .build()
}

/// Expired, empty cookie that makes the browser drop the session.
pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Extractor for the claims the gate attached to the request.
pub struct AuthUser(pub SessionClaims);

impl AuthUser {
    pub fn require_role(&self, role: Role) -> Result<(), ServiceError> {
        if self.0.role.satisfies(role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.0.sub, role = %self.0.role, required = %role, "Role check failed");
            Err(ServiceError::Forbidden)
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<SessionClaims>()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("No active session")))?;

        Ok(AuthUser(claims.clone()))
    }
}

/// Like [`AuthUser`] but never rejects; for routes that behave differently
/// with and without a session.
pub struct MaybeAuthUser(pub Option<SessionClaims>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(parts.extensions.get::<SessionClaims>().cloned()))
    }
}
