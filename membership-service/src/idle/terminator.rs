use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use super::monitor::ExpiryCause;
use super::watcher::SessionTerminator;
use crate::config::GateConfig;
use crate::middleware::gate::login_location;
use crate::services::{SessionClaims, SessionRevocations};
use crate::AppState;

/// Revokes the watched session and publishes where the user goes next.
///
/// The login URL is sent on the channel returned by [`RevokeOnExpiry::new`]
/// once the session has been revoked. An idle expiry carries
/// `error=SessionExpired`; a manual logout does not.
pub struct RevokeOnExpiry {
    revocations: Arc<dyn SessionRevocations>,
    gate: GateConfig,
    session_id: String,
    user_id: String,
    revoke_for_seconds: i64,
    callback: String,
    redirect: watch::Sender<Option<String>>,
}

impl RevokeOnExpiry {
    /// `callback` is the page the user was on; it becomes the login `callbackUrl`.
    pub fn new(
        state: &AppState,
        claims: &SessionClaims,
        callback: &str,
    ) -> (Self, watch::Receiver<Option<String>>) {
        let (redirect, rx) = watch::channel(None);
        let terminator = Self {
            revocations: state.revocations.clone(),
            gate: state.config.gate.clone(),
            session_id: claims.sid.clone(),
            user_id: claims.sub.clone(),
            revoke_for_seconds: state.issuer.ttl_seconds(),
            callback: callback.to_string(),
            redirect,
        };
        (terminator, rx)
    }
}

#[async_trait]
impl SessionTerminator for RevokeOnExpiry {
    async fn terminate(&self, cause: ExpiryCause) {
        if let Err(e) = self
            .revocations
            .revoke(&self.session_id, self.revoke_for_seconds)
            .await
        {
            tracing::error!(user_id = %self.user_id, error = %e, "Failed to revoke idle session");
        }

        let location = login_location(&self.gate, &self.callback, cause == ExpiryCause::Idle);
        tracing::info!(user_id = %self.user_id, cause = ?cause, "Session terminated");
        self.redirect.send_replace(Some(location));
    }
}
