use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{IdlePolicyResponse, LoginRequest, LoginResponse, SessionResponse},
        MessageResponse,
    },
    middleware::{
        gate::{removal_cookie, session_cookie},
        MaybeAuthUser,
    },
    services::ServiceError,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse),
        (status = 503, description = "Persistence disabled", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let profile = match state
        .verifier
        .verify(&req.email, &Password::new(req.password))
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            let outcome = match e {
                ServiceError::InvalidCredentials => "rejected",
                _ => "error",
            };
            metrics::counter!("login_attempts_total", "outcome" => outcome).increment(1);
            return Err(e.into());
        }
    };

    let issued = state.issuer.issue(&profile).map_err(ServiceError::from)?;
    metrics::counter!("login_attempts_total", "outcome" => "success").increment(1);

    tracing::info!(user_id = %profile.id, role = %profile.role, "Session issued");

    let expires_in = state.issuer.ttl_seconds();
    let cookie = session_cookie(&state.config.session, issued.token, expires_in);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: profile,
            expires_in,
        }),
    ))
}

/// End the current session. Succeeds with or without one.
///
/// The session is revoked, so copies of the cookie stop working too.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 503, description = "Session could not be revoked", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    MaybeAuthUser(claims): MaybeAuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    if let Some(claims) = claims {
        state
            .revocations
            .revoke(&claims.sid, state.issuer.ttl_seconds())
            .await
            .map_err(|e| {
                tracing::error!(user_id = %claims.sub, error = %e, "Failed to revoke session");
                AppError::ServiceUnavailable("session store unavailable".to_string())
            })?;
        tracing::info!(user_id = %claims.sub, "User logged out");
    }

    Ok((
        jar.add(removal_cookie(&state.config.session)),
        Json(MessageResponse::ok("Logged out")),
    ))
}

/// Current session, or `{}` when there is none
#[utoipa::path(
    get,
    path = "/auth/session",
    responses(
        (status = 200, description = "Current session or empty object", body = SessionResponse)
    ),
    tag = "Authentication"
)]
pub async fn session(
    State(state): State<AppState>,
    MaybeAuthUser(claims): MaybeAuthUser,
) -> Response {
    match claims {
        Some(claims) => Json(SessionResponse {
            user: claims.profile(),
            expires: claims.expires_at(),
            idle: IdlePolicyResponse {
                timeout_seconds: state.config.idle.timeout_seconds,
                warning_seconds: state.config.idle.warning_seconds,
            },
        })
        .into_response(),
        None => Json(serde_json::json!({})).into_response(),
    }
}
