mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{location, TestApp, MEMBER_EMAIL};
use membership_service::config::IdleConfig;
use membership_service::idle::{
    ActivityKind, ExpiryCause, IdleState, IdleWatcher, RevokeOnExpiry, SessionTerminator,
};
use membership_service::models::Role;
use membership_service::services::SessionRevocations;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingTerminator {
    calls: Mutex<Vec<ExpiryCause>>,
}

impl RecordingTerminator {
    fn calls(&self) -> Vec<ExpiryCause> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionTerminator for RecordingTerminator {
    async fn terminate(&self, cause: ExpiryCause) {
        self.calls.lock().unwrap().push(cause);
    }
}

const CONFIG: IdleConfig = IdleConfig {
    timeout_seconds: 600,
    warning_seconds: 60,
};

async fn idle_for(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn quiet_session_warns_then_logs_out() {
    let terminator = Arc::new(RecordingTerminator::default());
    let handle = IdleWatcher::spawn(CONFIG, terminator.clone());

    idle_for(539).await;
    assert_eq!(handle.state(), IdleState::Active);

    idle_for(2).await;
    assert!(matches!(handle.state(), IdleState::Warning { .. }));
    assert_eq!(handle.countdown_secs(), Some(59));

    idle_for(60).await;
    assert_eq!(handle.state(), IdleState::Expired(ExpiryCause::Idle));
    assert_eq!(terminator.calls(), vec![ExpiryCause::Idle]);
}

#[tokio::test(start_paused = true)]
async fn extend_during_warning_keeps_the_session() {
    let terminator = Arc::new(RecordingTerminator::default());
    let handle = IdleWatcher::spawn(CONFIG, terminator.clone());

    idle_for(545).await;
    assert!(matches!(handle.state(), IdleState::Warning { .. }));

    handle.extend().await;
    idle_for(1).await;
    assert_eq!(handle.state(), IdleState::Active);
    assert_eq!(handle.countdown_secs(), None);

    // Past the original deadline: nothing happens.
    idle_for(120).await;
    assert_eq!(handle.state(), IdleState::Active);
    assert!(terminator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn activity_keeps_the_session_alive() {
    let terminator = Arc::new(RecordingTerminator::default());
    let handle = IdleWatcher::spawn(CONFIG, terminator.clone());

    for _ in 0..5 {
        idle_for(300).await;
        handle.record_activity(ActivityKind::MouseMove);
    }
    idle_for(1).await;

    assert_eq!(handle.state(), IdleState::Active);
    assert!(terminator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn manual_logout_after_idle_expiry_is_a_no_op() {
    let terminator = Arc::new(RecordingTerminator::default());
    let handle = IdleWatcher::spawn(CONFIG, terminator.clone());

    assert_eq!(handle.expired().await, ExpiryCause::Idle);
    handle.logout().await;
    idle_for(10).await;

    assert_eq!(handle.state(), IdleState::Expired(ExpiryCause::Idle));
    assert_eq!(terminator.calls(), vec![ExpiryCause::Idle]);
}

#[tokio::test(start_paused = true)]
async fn idle_expiry_revokes_the_session_and_points_to_login() {
    let app = TestApp::new();
    let session = app.session_for("member-1", MEMBER_EMAIL, Role::Member);
    let (terminator, mut redirect) =
        RevokeOnExpiry::new(&app.state, &session.claims, "/anggota/profil");
    let handle = IdleWatcher::spawn(app.state.config.idle, Arc::new(terminator));

    assert_eq!(handle.expired().await, ExpiryCause::Idle);
    let target = redirect.wait_for(Option::is_some).await.unwrap().clone();
    assert_eq!(
        target.as_deref(),
        Some("/auth/login?callbackUrl=%2Fanggota%2Fprofil&error=SessionExpired")
    );

    let res = app.get("/anggota", Some(&session.token)).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert!(location(&res).starts_with("/auth/login?callbackUrl=%2Fanggota"));
}

#[tokio::test(start_paused = true)]
async fn manual_logout_revokes_without_the_expired_flag() {
    let app = TestApp::new();
    let session = app.session_for("member-1", MEMBER_EMAIL, Role::Member);
    let (terminator, mut redirect) = RevokeOnExpiry::new(&app.state, &session.claims, "/anggota");
    let handle = IdleWatcher::spawn(app.state.config.idle, Arc::new(terminator));

    handle.logout().await;
    let target = redirect.wait_for(Option::is_some).await.unwrap().clone();
    assert_eq!(target.as_deref(), Some("/auth/login?callbackUrl=%2Fanggota"));
    assert!(app
        .state
        .revocations
        .is_revoked(&session.claims.sid)
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn active_session_is_not_revoked() {
    let app = TestApp::new();
    let session = app.session_for("member-1", MEMBER_EMAIL, Role::Member);
    let (terminator, redirect) = RevokeOnExpiry::new(&app.state, &session.claims, "/anggota");
    let handle = IdleWatcher::spawn(app.state.config.idle, Arc::new(terminator));

    idle_for(300).await;
    handle.record_activity(ActivityKind::KeyPress);
    idle_for(400).await;

    assert_eq!(handle.state(), IdleState::Active);
    assert!(redirect.borrow().is_none());
    let res = app.get("/anggota", Some(&session.token)).await;
    assert_ne!(res.status(), StatusCode::SEE_OTHER);
}
