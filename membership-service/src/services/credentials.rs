use std::sync::Arc;

use crate::{
    models::{Identity, IdentityProfile},
    services::{IdentityStore, ServiceError, StoreError},
    utils::{hash_password, verify_against_dummy, verify_password, Password, PasswordHashString},
};

/// Checks an email/password pair against the identity store.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn IdentityStore>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Returns the matching profile or [`ServiceError::InvalidCredentials`].
    ///
    /// Unknown email, wrong password, inactive account and an unreadable
    /// stored hash are indistinguishable to the caller. An unknown email
    /// still pays for one hash verification. A bcrypt hash that matches is
    /// replaced with Argon2id.
    pub async fn verify(
        &self,
        email: &str,
        password: &Password,
    ) -> Result<IdentityProfile, ServiceError> {
        if email.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidCredentials);
        }

        let identity = match self.store.find_by_email(email).await {
            Ok(identity) => identity,
            Err(StoreError::CorruptRecord { id, reason }) => {
                tracing::error!(identity_id = %id, reason = %reason, "Stored identity is unreadable");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let password = password.clone();
        let outcome = tokio::task::spawn_blocking(move || match identity {
            Some(identity) => {
                let hash = PasswordHashString::new(identity.credential_hash.clone());
                let matched = verify_password(&password, &hash).is_ok();
                let upgraded = if matched && hash.needs_rehash() {
                    hash_password(&password)
                        .map_err(|e| tracing::warn!(error = %e, "Rehash failed"))
                        .ok()
                } else {
                    None
                };
                Some((identity, matched, upgraded))
            }
            None => {
                verify_against_dummy(&password);
                None
            }
        })
        .await
        .map_err(|e| {
            ServiceError::Internal(anyhow::anyhow!("Password verification task failed: {}", e))
        })?;

        match outcome {
            Some((identity, true, upgraded)) if identity.can_sign_in() => {
                tracing::info!(user_id = %identity.id, role = %identity.role, "Credentials verified");
                if let Some(hash) = upgraded {
                    self.upgrade_hash(&identity, &hash).await;
                }
                Ok(identity.profile())
            }
            Some((identity, true, _)) => {
                reject(&identity, "inactive account");
                Err(ServiceError::InvalidCredentials)
            }
            Some((identity, false, _)) => {
                reject(&identity, "password mismatch");
                Err(ServiceError::InvalidCredentials)
            }
            None => {
                tracing::warn!("Login attempt for unknown email");
                Err(ServiceError::InvalidCredentials)
            }
        }
    }

    /// Best effort; a failed write leaves the old hash in place.
    async fn upgrade_hash(&self, identity: &Identity, hash: &PasswordHashString) {
        match self.store.update_credential(&identity.id, hash).await {
            Ok(()) => tracing::info!(user_id = %identity.id, "Legacy password hash upgraded"),
            Err(e) => {
                tracing::warn!(user_id = %identity.id, error = %e, "Password hash upgrade failed")
            }
        }
    }
}

fn reject(identity: &Identity, reason: &'static str) {
    tracing::warn!(user_id = %identity.id, reason, "Login rejected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IdentityRow, IdentityStatus, Role};
    use crate::services::{DisabledIdentityStore, InMemoryIdentityStore};

    const BCRYPT_ADMIN123: &str = "$2a$10$Xq3vN0pLr8sT2wYz6bC4depumRoWejP0p6F3kPI2j4HDlQ9xlYTkO";

    fn identity(id: &str, email: &str, password: &str, status: IdentityStatus) -> Identity {
        Identity {
            id: id.to_string(),
            email: email.to_string(),
            display_name: "Ahmad Rizki".to_string(),
            role: Role::Member,
            status,
            credential_hash: hash_password(&Password::new(password.to_string()))
                .unwrap()
                .into_string(),
            nim: Some("2021001".to_string()),
        }
    }

    fn verifier() -> CredentialVerifier {
        let store = InMemoryIdentityStore::with_identities([
            identity(
                "u1",
                "anggota@mapala.ac.id",
                "anggota123",
                IdentityStatus::Active,
            ),
            identity(
                "u2",
                "alumni@mapala.ac.id",
                "alumni123",
                IdentityStatus::Inactive,
            ),
            Identity {
                credential_hash: "$2a$12$legacybcrypthashvalue".to_string(),
                ..identity("u3", "lama@mapala.ac.id", "x", IdentityStatus::Active)
            },
        ]);
        CredentialVerifier::new(Arc::new(store))
    }

    fn pw(s: &str) -> Password {
        Password::new(s.to_string())
    }

    #[tokio::test]
    async fn valid_credentials_return_profile_without_hash() {
        let profile = verifier()
            .verify("anggota@mapala.ac.id", &pw("anggota123"))
            .await
            .unwrap();

        assert_eq!(profile.id, "u1");
        assert_eq!(profile.role, Role::Member);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2"));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_fail_identically() {
        let verifier = verifier();

        let unknown = verifier
            .verify("siapa@mapala.ac.id", &pw("anggota123"))
            .await
            .unwrap_err();
        let wrong = verifier
            .verify("anggota@mapala.ac.id", &pw("salah"))
            .await
            .unwrap_err();

        assert!(matches!(unknown, ServiceError::InvalidCredentials));
        assert!(matches!(wrong, ServiceError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn inactive_account_is_rejected_like_bad_credentials() {
        let err = verifier()
            .verify("alumni@mapala.ac.id", &pw("alumni123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn unreadable_stored_hash_fails_closed() {
        let err = verifier()
            .verify("lama@mapala.ac.id", &pw("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn email_match_is_case_sensitive() {
        let err = verifier()
            .verify("Anggota@mapala.ac.id", &pw("anggota123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let verifier = verifier();
        assert!(matches!(
            verifier.verify("", &pw("anggota123")).await,
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            verifier.verify("anggota@mapala.ac.id", &pw("")).await,
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn bcrypt_account_signs_in_and_is_upgraded() {
        let store = Arc::new(InMemoryIdentityStore::with_identities([Identity {
            role: Role::Admin,
            credential_hash: BCRYPT_ADMIN123.to_string(),
            ..identity("a1", "admin@mapala.ac.id", "x", IdentityStatus::Active)
        }]));
        let verifier = CredentialVerifier::new(store.clone());

        let profile = verifier
            .verify("admin@mapala.ac.id", &pw("admin123"))
            .await
            .unwrap();
        assert_eq!(profile.role, Role::Admin);

        let stored = store.find_by_id("a1").await.unwrap().unwrap();
        assert!(stored.credential_hash.starts_with("$argon2id$"));

        // Still the same password after the upgrade.
        assert!(verifier
            .verify("admin@mapala.ac.id", &pw("admin123"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn wrong_password_leaves_bcrypt_hash_alone() {
        let store = Arc::new(InMemoryIdentityStore::with_identities([Identity {
            credential_hash: BCRYPT_ADMIN123.to_string(),
            ..identity("a1", "admin@mapala.ac.id", "x", IdentityStatus::Active)
        }]));
        let verifier = CredentialVerifier::new(store.clone());

        let err = verifier
            .verify("admin@mapala.ac.id", &pw("admin124"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        let stored = store.find_by_id("a1").await.unwrap().unwrap();
        assert_eq!(stored.credential_hash, BCRYPT_ADMIN123);
    }

    #[tokio::test]
    async fn pending_applicant_row_signs_in() {
        let store = InMemoryIdentityStore::with_rows([IdentityRow {
            id: "p1".to_string(),
            email: "mahasiswa.baru@student.ac.id".to_string(),
            name: Some("Doni Prasetyo".to_string()),
            role: "MAHASISWA_BARU".to_string(),
            status: "PENDING".to_string(),
            password_hash: hash_password(&pw("password123")).unwrap().into_string(),
            nim: None,
        }]);

        let profile = CredentialVerifier::new(Arc::new(store))
            .verify("mahasiswa.baru@student.ac.id", &pw("password123"))
            .await
            .unwrap();
        assert_eq!(profile.role, Role::Applicant);
    }

    #[tokio::test]
    async fn unreadable_stored_role_fails_like_bad_credentials() {
        let mut row = IdentityRow::from(identity(
            "u9",
            "aneh@mapala.ac.id",
            "anggota123",
            IdentityStatus::Active,
        ));
        row.role = "SUPERUSER".to_string();
        let verifier = CredentialVerifier::new(Arc::new(InMemoryIdentityStore::with_rows([row])));

        let err = verifier
            .verify("aneh@mapala.ac.id", &pw("anggota123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn disabled_store_is_not_reported_as_bad_credentials() {
        let verifier = CredentialVerifier::new(Arc::new(DisabledIdentityStore));
        let err = verifier
            .verify("anggota@mapala.ac.id", &pw("anggota123"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PersistenceDisabled));
    }
}
