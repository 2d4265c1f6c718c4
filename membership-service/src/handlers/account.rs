use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::{
    dtos::{
        account::{ChangeEmailRequest, ChangeEmailResponse, ChangePasswordRequest},
        MessageResponse,
    },
    middleware::{gate::session_cookie, AuthUser},
    services::ServiceError,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Change the signed-in user's password
#[utoipa::path(
    put,
    path = "/api/user/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .accounts
        .change_password(
            &user.0.sub,
            Password::new(req.current_password),
            Password::new(req.new_password),
        )
        .await?;

    Ok(Json(MessageResponse::ok("Password updated")))
}

/// Change the signed-in user's e-mail address
///
/// The session cookie is re-issued so it carries the new address.
#[utoipa::path(
    put,
    path = "/api/user/email",
    request_body = ChangeEmailRequest,
    responses(
        (status = 200, description = "Email updated", body = ChangeEmailResponse),
        (status = 401, description = "Password is incorrect", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "User"
)]
pub async fn change_email(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<ChangeEmailRequest>,
) -> Result<(CookieJar, Json<ChangeEmailResponse>), AppError> {
    let profile = state
        .accounts
        .change_email(&user.0.sub, &req.new_email, Password::new(req.password))
        .await?;

    let issued = state
        .issuer
        .reissue(&profile, &user.0.sid)
        .map_err(ServiceError::from)?;
    let cookie = session_cookie(&state.config.session, issued.token, state.issuer.ttl_seconds());

    Ok((
        jar.add(cookie),
        Json(ChangeEmailResponse {
            success: true,
            message: "Email updated".to_string(),
            email: profile.email,
        }),
    ))
}
