//! Credential store backends.
//!
//! The backend is picked once at start-up from `PERSISTENCE_BACKEND` and
//! handed to the services as an `Arc<dyn IdentityStore>`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::PersistenceBackend;
use crate::models::{Identity, IdentityRow};
use crate::utils::PasswordHashString;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("persistence backend is disabled")]
    Disabled,

    #[error("identity not found")]
    NotFound,

    #[error("email already in use")]
    EmailTaken,

    #[error("stored identity {id} is invalid: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    fn backend(&self) -> PersistenceBackend;

    /// Exact, case-sensitive email lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError>;

    async fn update_credential(
        &self,
        id: &str,
        new_hash: &PasswordHashString,
    ) -> Result<(), StoreError>;

    async fn update_email(&self, id: &str, new_email: &str) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

const IDENTITY_COLUMNS: &str = "id, email, name, role, status, password_hash, nim";

/// PostgreSQL-backed store over the `users` table.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub async fn connect(
        database_url: &Secret<String>,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url.expose_secret())
            .await?;

        tracing::info!(max_connections, "PostgreSQL pool connected");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drain and close the pool; called once during shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}

/// Row to domain identity; an unreadable row is a [`StoreError::CorruptRecord`].
fn into_identity(row: IdentityRow) -> Result<Identity, StoreError> {
    let id = row.id.clone();
    Identity::try_from(row).map_err(|e| StoreError::CorruptRecord {
        id,
        reason: e.to_string(),
    })
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    fn backend(&self) -> PersistenceBackend {
        PersistenceBackend::Postgres
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            IDENTITY_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_identity).transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_identity).transpose()
    }

    async fn update_credential(
        &self,
        id: &str,
        new_hash: &PasswordHashString,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
                .bind(new_hash.as_str())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_email(&self, id: &str, new_email: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
            .bind(new_email)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::EmailTaken,
                other => StoreError::Database(other),
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Explicit "no persistence" backend. Every call fails with [`StoreError::Disabled`].
#[derive(Debug, Clone, Default)]
pub struct DisabledIdentityStore;

#[async_trait]
impl IdentityStore for DisabledIdentityStore {
    fn backend(&self) -> PersistenceBackend {
        PersistenceBackend::Disabled
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<Identity>, StoreError> {
        Err(StoreError::Disabled)
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<Identity>, StoreError> {
        Err(StoreError::Disabled)
    }

    async fn update_credential(
        &self,
        _id: &str,
        _new_hash: &PasswordHashString,
    ) -> Result<(), StoreError> {
        Err(StoreError::Disabled)
    }

    async fn update_email(&self, _id: &str, _new_email: &str) -> Result<(), StoreError> {
        Err(StoreError::Disabled)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Disabled)
    }
}

/// Process-local store keyed by identity id, for tests and local runs.
///
/// Holds raw rows so reads go through the same conversion as Postgres.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    rows: RwLock<HashMap<String, IdentityRow>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self::with_rows(identities.into_iter().map(IdentityRow::from))
    }

    pub fn with_rows(rows: impl IntoIterator<Item = IdentityRow>) -> Self {
        let map = rows.into_iter().map(|row| (row.id.clone(), row)).collect();
        Self {
            rows: RwLock::new(map),
        }
    }

    pub async fn insert(&self, identity: Identity) {
        self.insert_row(identity.into()).await;
    }

    pub async fn insert_row(&self, row: IdentityRow) {
        self.rows.write().await.insert(row.id.clone(), row);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    fn backend(&self) -> PersistenceBackend {
        // Stands in for the real backend.
        PersistenceBackend::Postgres
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        self.rows
            .read()
            .await
            .values()
            .find(|row| row.email == email)
            .cloned()
            .map(into_identity)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, StoreError> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .map(into_identity)
            .transpose()
    }

    async fn update_credential(
        &self,
        id: &str,
        new_hash: &PasswordHashString,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(id).ok_or(StoreError::NotFound)?;
        row.password_hash = new_hash.as_str().to_string();
        Ok(())
    }

    async fn update_email(&self, id: &str, new_email: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|other| other.id != id && other.email == new_email)
        {
            return Err(StoreError::EmailTaken);
        }
        let row = rows.get_mut(id).ok_or(StoreError::NotFound)?;
        row.email = new_email.to_string();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
