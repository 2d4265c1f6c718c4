use std::sync::Arc;

use crate::{
    models::{Identity, IdentityProfile},
    services::{IdentityStore, ServiceError},
    utils::{hash_password, verify_password, Password, PasswordHashString},
};

/// Self-service credential and e-mail changes for an authenticated subject.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn change_password(
        &self,
        subject_id: &str,
        current: Password,
        new: Password,
    ) -> Result<(), ServiceError> {
        let identity = self.load(subject_id).await?;
        confirm_password(&identity, current).await?;

        let new_hash = tokio::task::spawn_blocking(move || hash_password(&new))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
            .map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
            })?;

        self.store.update_credential(&identity.id, &new_hash).await?;

        tracing::info!(user_id = %identity.id, "Password changed");
        Ok(())
    }

    /// Password is confirmed before the uniqueness check so the endpoint
    /// cannot be used to discover registered addresses.
    pub async fn change_email(
        &self,
        subject_id: &str,
        new_email: &str,
        password: Password,
    ) -> Result<IdentityProfile, ServiceError> {
        let identity = self.load(subject_id).await?;
        confirm_password(&identity, password).await?;

        if identity.email == new_email {
            return Err(ServiceError::Validation(
                "New email is the same as the current one".to_string(),
            ));
        }

        if let Some(existing) = self.store.find_by_email(new_email).await? {
            if existing.id != identity.id {
                return Err(ServiceError::EmailAlreadyRegistered);
            }
        }

        self.store.update_email(&identity.id, new_email).await?;

        tracing::info!(user_id = %identity.id, "Email changed");

        let mut profile = identity.profile();
        profile.email = new_email.to_string();
        Ok(profile)
    }

    async fn load(&self, subject_id: &str) -> Result<Identity, ServiceError> {
        let identity = self
            .store
            .find_by_id(subject_id)
            .await?
            .ok_or(ServiceError::IdentityNotFound)?;

        if !identity.can_sign_in() {
            return Err(ServiceError::InvalidSession);
        }
        Ok(identity)
    }
}

async fn confirm_password(identity: &Identity, password: Password) -> Result<(), ServiceError> {
    let hash = PasswordHashString::new(identity.credential_hash.clone());
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &hash).is_ok())
        .await
        .map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password verification task failed: {}", e))
        })?;

    if !matched {
        tracing::warn!(user_id = %identity.id, "Current password mismatch");
        return Err(ServiceError::IncorrectPassword);
    }
    Ok(())
}
