use service_core::error::AppError;
use thiserror::Error;

use super::session::SessionError;
use super::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Unknown email, wrong password and inactive account all collapse here.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Insufficient role")]
    Forbidden,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence is disabled")]
    PersistenceDisabled,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Disabled => ServiceError::PersistenceDisabled,
            StoreError::NotFound => ServiceError::IdentityNotFound,
            StoreError::EmailTaken => ServiceError::EmailAlreadyRegistered,
            other => ServiceError::Store(other),
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Expired => ServiceError::SessionExpired,
            SessionError::Malformed(_) => ServiceError::InvalidSession,
            SessionError::Signing(e) => ServiceError::Internal(e),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => {
                AppError::AuthError(anyhow::anyhow!("Invalid email or password"))
            }
            ServiceError::IncorrectPassword => {
                AppError::Unauthorized(anyhow::anyhow!("Current password is incorrect"))
            }
            ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!("Insufficient role")),
            ServiceError::SessionExpired => {
                AppError::Unauthorized(anyhow::anyhow!("Session expired"))
            }
            ServiceError::InvalidSession => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid session"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::IdentityNotFound => {
                AppError::NotFound(anyhow::anyhow!("Identity not found"))
            }
            ServiceError::Validation(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            ServiceError::PersistenceDisabled => {
                AppError::ServiceUnavailable("persistence backend is disabled".to_string())
            }
            ServiceError::Store(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_store_maps_to_service_unavailable() {
        let app: AppError = ServiceError::from(StoreError::Disabled).into();
        assert!(matches!(app, AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn credential_failure_message_is_generic() {
        let app: AppError = ServiceError::InvalidCredentials.into();
        assert_eq!(
            app.to_string(),
            "Authentication error: Invalid email or password"
        );
    }

    #[test]
    fn expired_session_error_maps_to_session_expired() {
        assert!(matches!(
            ServiceError::from(SessionError::Expired),
            ServiceError::SessionExpired
        ));
    }
}
