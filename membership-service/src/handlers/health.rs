use axum::{extract::State, Json};
use serde_json::{json, Map, Value};
use service_core::error::AppError;

use crate::{config::PersistenceBackend, AppState};

/// Keys reported as configured or missing. Values are never exposed.
const REPORTED_ENV_KEYS: [&str; 6] = [
    "SESSION_SECRET",
    "DATABASE_URL",
    "REDIS_URL",
    "SESSION_COOKIE_SECURE",
    "ALLOWED_ORIGINS",
    "OTLP_ENDPOINT",
];

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Credential or revocation store is unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let backend = state.store.backend();

    let persistence = match backend {
        PersistenceBackend::Disabled => "disabled",
        PersistenceBackend::Postgres => {
            state.store.health_check().await.map_err(|e| {
                tracing::error!(error = %e, "Credential store health check failed");
                AppError::ServiceUnavailable("credential store unreachable".to_string())
            })?;
            "up"
        }
    };

    state.revocations.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Revocation store health check failed");
        AppError::ServiceUnavailable("revocation store unreachable".to_string())
    })?;

    let env: Map<String, Value> = REPORTED_ENV_KEYS
        .iter()
        .map(|key| {
            let configured = std::env::var(key).map(|v| !v.is_empty()).unwrap_or(false);
            (key.to_string(), Value::Bool(configured))
        })
        .collect();

    let status = if persistence == "up" { "healthy" } else { "degraded" };

    Ok(Json(json!({
        "status": status,
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "timestamp": chrono::Utc::now(),
        "checks": {
            "persistenceBackend": backend.as_str(),
            "persistence": persistence,
            "revocationBackend": state.revocations.backend().as_str(),
        },
        "env": env,
    })))
}
