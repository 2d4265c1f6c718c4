mod common;

use axum::http::StatusCode;
use common::{
    body_json, session_cookie_value, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD, MEMBER_EMAIL,
    MEMBER_PASSWORD,
};
use membership_service::services::IdentityStore;
use membership_service::utils::{verify_password, Password, PasswordHashString};
use serde_json::json;

#[tokio::test]
async fn member_changes_own_password() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/password",
            Some(&token),
            json!({ "currentPassword": MEMBER_PASSWORD, "newPassword": "rimba-raya-2024" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["success"], true);

    let stored = app.store.find_by_id("member-1").await.unwrap().unwrap();
    let hash = PasswordHashString::new(stored.credential_hash);
    assert!(verify_password(&Password::new("rimba-raya-2024".to_string()), &hash).is_ok());

    app.login(MEMBER_EMAIL, "rimba-raya-2024").await;
}

#[tokio::test]
async fn wrong_current_password_is_rejected() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/password",
            Some(&token),
            json!({ "currentPassword": "salah", "newPassword": "rimba-raya-2024" }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn short_new_password_fails_validation() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/password",
            Some(&token),
            json!({ "currentPassword": MEMBER_PASSWORD, "newPassword": "pendek" }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn password_change_without_session_redirects_to_login() {
    let app = TestApp::new();

    let res = app
        .json(
            "PUT",
            "/api/user/password",
            None,
            json!({ "currentPassword": MEMBER_PASSWORD, "newPassword": "rimba-raya-2024" }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn email_change_reissues_session_with_new_address() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/email",
            Some(&token),
            json!({ "newEmail": "rizki@mapala.ac.id", "password": MEMBER_PASSWORD }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let new_token = session_cookie_value(&res).expect("session re-issued");
    let claims = app.state.issuer.validate(&new_token).unwrap();
    assert_eq!(claims.email, "rizki@mapala.ac.id");
    assert_eq!(claims.sub, "member-1");

    assert_eq!(body_json(res).await["email"], "rizki@mapala.ac.id");
}

#[tokio::test]
async fn email_change_to_taken_address_conflicts() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/email",
            Some(&token),
            json!({ "newEmail": ADMIN_EMAIL, "password": MEMBER_PASSWORD }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn email_change_rejects_invalid_address() {
    let app = TestApp::new();
    let token = app.login(MEMBER_EMAIL, MEMBER_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/user/email",
            Some(&token),
            json!({ "newEmail": "bukan-email", "password": MEMBER_PASSWORD }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_changes_password_through_admin_route() {
    let app = TestApp::new();
    let token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let res = app
        .json(
            "PUT",
            "/api/admin/password",
            Some(&token),
            json!({ "currentPassword": ADMIN_PASSWORD, "newPassword": "puncak-3676" }),
        )
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    app.login(ADMIN_EMAIL, "puncak-3676").await;
}
