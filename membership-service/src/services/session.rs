use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{SessionConfig, MIN_SESSION_SECRET_BYTES};
use crate::models::{IdentityProfile, Role};

/// Signed session claims. Immutable once issued; a changed role or email
/// means issuing a new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (identity id)
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token id
    pub jti: String,
    /// Session id; carried over by sliding refreshes, used for revocation.
    pub sid: String,
}

impl SessionClaims {
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.sub.clone(),
            email: self.email.clone(),
            display_name: self.name.clone(),
            role: self.role,
            nim: None,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub claims: SessionClaims,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session token is malformed: {0}")]
    Malformed(String),

    #[error("session token has expired")]
    Expired,

    #[error("failed to sign session token: {0}")]
    Signing(anyhow::Error),
}

/// Issues and validates HS256 session tokens.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    refresh_after: Duration,
}

impl SessionIssuer {
    /// Fails when the signing secret is missing or too short; there is no
    /// unsigned or default-key mode.
    pub fn new(config: &SessionConfig) -> Result<Self, AppError> {
        let secret = config.secret.expose_secret();
        if secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        tracing::info!(
            ttl_seconds = config.ttl_seconds,
            refresh_after_seconds = config.refresh_after_seconds,
            "Session issuer initialized with HS256 key"
        );

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(config.ttl_seconds),
            refresh_after: Duration::seconds(config.refresh_after_seconds),
        })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, identity: &IdentityProfile) -> Result<IssuedSession, SessionError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a new session as if the current time were `now`.
    pub fn issue_at(
        &self,
        identity: &IdentityProfile,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SessionError> {
        self.sign(identity, Uuid::new_v4().to_string(), now)
    }

    /// Re-issue within an existing session, e.g. after the email changed.
    pub fn reissue(
        &self,
        identity: &IdentityProfile,
        session_id: &str,
    ) -> Result<IssuedSession, SessionError> {
        self.sign(identity, session_id.to_string(), Utc::now())
    }

    fn sign(
        &self,
        identity: &IdentityProfile,
        sid: String,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SessionError> {
        let claims = SessionClaims {
            sub: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.display_name.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            sid,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(anyhow::anyhow!(e)))?;

        Ok(IssuedSession { token, claims })
    }

    /// Verify signature and expiry. No clock leeway is granted.
    pub fn validate(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Malformed(e.to_string()),
            },
        )?;

        if data.claims.iat > data.claims.exp {
            return Err(SessionError::Malformed("iat after exp".to_string()));
        }

        Ok(data.claims)
    }

    pub fn refresh_if_due(
        &self,
        claims: &SessionClaims,
    ) -> Result<Option<IssuedSession>, SessionError> {
        self.refresh_if_due_at(claims, Utc::now())
    }

    /// Sliding refresh: re-issue with a fresh expiry once the token is at
    /// least `refresh_after` old. Subject, role and session id are carried
    /// over unchanged.
    pub fn refresh_if_due_at(
        &self,
        claims: &SessionClaims,
        now: DateTime<Utc>,
    ) -> Result<Option<IssuedSession>, SessionError> {
        if now.timestamp() - claims.iat < self.refresh_after.num_seconds() {
            return Ok(None);
        }
        self.sign(&claims.profile(), claims.sid.clone(), now).map(Some)
    }
}
