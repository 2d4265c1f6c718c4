//! Revoked sessions.
//!
//! Session tokens are stateless, so logging out or timing out has to be
//! remembered until every token of that session would have expired anyway.
//! Entries are keyed by the session id (`sid` claim), which survives
//! sliding refreshes.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RevocationBackend;

#[async_trait]
pub trait SessionRevocations: Send + Sync {
    fn backend(&self) -> RevocationBackend;

    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), anyhow::Error>;

    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

fn revocation_key(session_id: &str) -> String {
    format!("revoked-session:{}", session_id)
}

/// Redis-backed list shared by every instance of the service.
#[derive(Clone)]
pub struct RedisRevocations {
    manager: ConnectionManager,
}

impl RedisRevocations {
    pub async fn connect(url: &Secret<String>) -> Result<Self, anyhow::Error> {
        let client = Client::open(url.expose_secret().as_str())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Connected to Redis for session revocation");
        Ok(Self { manager })
    }
}

#[async_trait]
impl SessionRevocations for RedisRevocations {
    fn backend(&self) -> RevocationBackend {
        RevocationBackend::Redis
    }

    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();

        redis::cmd("SET")
            .arg(revocation_key(session_id))
            .arg("revoked")
            .arg("EX")
            .arg(expiry_seconds.max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to revoke session: {}", e))
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();

        let exists: bool = redis::cmd("EXISTS")
            .arg(revocation_key(session_id))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to check session revocation: {}", e))?;

        Ok(exists)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// Process-local list for a single instance and for tests.
#[derive(Default)]
pub struct InMemoryRevocations {
    revoked: Mutex<HashMap<String, Instant>>,
}

impl InMemoryRevocations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRevocations for InMemoryRevocations {
    fn backend(&self) -> RevocationBackend {
        RevocationBackend::Memory
    }

    async fn revoke(&self, session_id: &str, expiry_seconds: i64) -> Result<(), anyhow::Error> {
        let now = Instant::now();
        let until = now + Duration::from_secs(expiry_seconds.max(0).unsigned_abs());

        let mut revoked = self
            .revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation list mutex poisoned: {}", e))?;
        revoked.retain(|_, deadline| *deadline > now);
        revoked.insert(session_id.to_string(), until);
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        let revoked = self
            .revoked
            .lock()
            .map_err(|e| anyhow::anyhow!("Revocation list mutex poisoned: {}", e))?;
        Ok(revoked
            .get(session_id)
            .is_some_and(|deadline| *deadline > Instant::now()))
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
