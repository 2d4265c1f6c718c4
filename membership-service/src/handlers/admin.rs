use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::{
    dtos::{account::ChangePasswordRequest, MessageResponse},
    middleware::AuthUser,
    models::Role,
    utils::{Password, ValidatedJson},
    AppState,
};

/// Change an administrator's own password
#[utoipa::path(
    put,
    path = "/api/admin/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn change_admin_password(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    user.require_role(Role::Admin)?;

    state
        .accounts
        .change_password(
            &user.0.sub,
            Password::new(req.current_password),
            Password::new(req.new_password),
        )
        .await?;

    tracing::info!(user_id = %user.0.sub, "Administrator password changed");
    Ok(Json(MessageResponse::ok("Password updated")))
}
