//! Credential login, session cookies, refresh and logout.

mod common;

use account_service::store::CredentialStore;
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn login_sets_access_cookie_only() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("alice@example.com", "correct-password-1").await;

    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "alice@example.com", "password": "correct-password-1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "complete");
    assert_eq!(
        res.body["account"]["accountId"],
        account_id.to_string().as_str()
    );

    assert!(res.cookie_pair(&format!("access_token_{account_id}")).is_some());
    assert!(res.cookie_pair(&format!("refresh_token_{account_id}")).is_none());

    // Access cookie is httpOnly.
    let raw = res
        .set_cookies()
        .into_iter()
        .find(|c| c.starts_with(&format!("access_token_{account_id}=")))
        .unwrap();
    assert!(raw.contains("HttpOnly"));
}

#[tokio::test]
async fn remember_me_adds_refresh_cookie() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("bob@example.com", "correct-password-1").await;

    let res = app
        .post_json(
            "/auth/login",
            json!({
                "identifier": "bob@example.com",
                "password": "correct-password-1",
                "rememberMe": true,
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.cookie_pair(&format!("refresh_token_{account_id}")).is_some());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let app = TestApp::spawn();
    app.signup_account("carol@example.com", "correct-password-1").await;

    let wrong_password = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "carol@example.com", "password": "wrong-password-00" }),
        )
        .await;
    let unknown_user = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "nobody@example.com", "password": "whatever-password" }),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(wrong_password.body["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn refresh_mints_new_access_token_without_rotating() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("dave@example.com", "correct-password-1").await;

    let login = app
        .post_json(
            "/auth/login",
            json!({
                "identifier": "dave@example.com",
                "password": "correct-password-1",
                "rememberMe": true,
            }),
        )
        .await;
    let refresh_cookie = login
        .cookie_pair(&format!("refresh_token_{account_id}"))
        .unwrap();

    let res = app
        .post_json_with_headers(
            "/auth/refresh",
            json!({ "accountId": account_id }),
            &[("cookie", refresh_cookie.as_str())],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.cookie_pair(&format!("access_token_{account_id}")).is_some());
    // The refresh token was not reissued.
    assert!(res.cookie_pair(&format!("refresh_token_{account_id}")).is_none());

    // The same refresh cookie keeps working.
    let res = app
        .post_json_with_headers(
            "/auth/refresh",
            json!({ "accountId": account_id }),
            &[("cookie", refresh_cookie.as_str())],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_cookie_is_rejected() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("eve@example.com", "correct-password-1").await;

    let res = app
        .post_json("/auth/refresh", json!({ "accountId": account_id }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn logout_expires_both_cookies() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("frank@example.com", "correct-password-1").await;

    let res = app
        .post_json("/auth/logout", json!({ "accountId": account_id }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let cookies = res.set_cookies();
    let access = cookies
        .iter()
        .find(|c| c.starts_with(&format!("access_token_{account_id}=")))
        .unwrap();
    let refresh = cookies
        .iter()
        .find(|c| c.starts_with(&format!("refresh_token_{account_id}=")))
        .unwrap();
    assert!(access.contains("Max-Age=0"));
    assert!(refresh.contains("Max-Age=0"));
}

#[tokio::test]
async fn oauth_account_cannot_password_login() {
    let app = TestApp::spawn();

    let account =
        account_service::models::Account::new_oauth("grace@example.com".to_string(), None);
    app.store.create(&account).await.unwrap();

    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "grace@example.com", "password": "any-password-123" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "AUTH_FAILED");
}
