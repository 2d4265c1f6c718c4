pub mod account;
pub mod admin;
pub mod auth;
pub mod health;
pub mod metrics;

use service_core::error::AppError;

pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Not found"))
}
