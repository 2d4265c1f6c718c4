use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => AppError::ServiceUnavailable("metrics recorder not installed".to_string())
            .into_response(),
    }
}
