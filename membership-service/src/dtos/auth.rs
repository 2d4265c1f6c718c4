use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::IdentityProfile;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    #[schema(example = "anggota@mapala.ac.id")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "anggota123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: IdentityProfile,
    /// Seconds until the session cookie expires unless refreshed by activity.
    #[schema(example = 600)]
    pub expires_in: i64,
}

/// Idle-timeout settings the client monitor should run with.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdlePolicyResponse {
    #[schema(example = 600)]
    pub timeout_seconds: u64,
    #[schema(example = 60)]
    pub warning_seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: IdentityProfile,
    pub expires: DateTime<Utc>,
    pub idle: IdlePolicyResponse,
}
