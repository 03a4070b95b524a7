//! 2FA enrollment and the temp-token challenge flow.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

fn totp_code(secret_base32: &str) -> String {
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap(),
        Some("account-service".to_string()),
        "test@example.com".to_string(),
    )
    .unwrap();
    totp.generate_current().unwrap()
}

/// Log in and return the raw access token from the session cookie.
async fn login_access_token(app: &TestApp, email: &str, password: &str, account_id: Uuid) -> String {
    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": email, "password": password }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let pair = res
        .cookie_pair(&format!("access_token_{account_id}"))
        .expect("access cookie");
    pair.splitn(2, '=').nth(1).unwrap().to_string()
}

/// Full enrollment: returns (secret, backup codes).
async fn enroll(app: &TestApp, email: &str, password: &str, account_id: Uuid) -> (String, Vec<String>) {
    let bearer = login_access_token(app, email, password, account_id).await;
    let auth = format!("Bearer {bearer}");

    let res = app
        .post_json_with_headers(
            "/auth/2fa/enable",
            json!({ "accountId": account_id }),
            &[("authorization", auth.as_str())],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "enable: {:?}", res.body);
    let secret = res.body["secret"].as_str().unwrap().to_string();
    let backup_codes: Vec<String> = res.body["backupCodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(res.body["otpauthUrl"]
        .as_str()
        .unwrap()
        .starts_with("otpauth://totp/"));

    let res = app
        .post_json_with_headers(
            "/auth/2fa/confirm",
            json!({ "accountId": account_id, "code": totp_code(&secret) }),
            &[("authorization", auth.as_str())],
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "confirm: {:?}", res.body);

    (secret, backup_codes)
}

#[tokio::test]
async fn enrollment_gates_login_behind_second_factor() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("alice@example.com", "correct-password-1").await;

    let (secret, _) = enroll(&app, "alice@example.com", "correct-password-1", account_id).await;

    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "alice@example.com", "password": "correct-password-1" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "twoFactorRequired");
    let temp_token = res.body["tempToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": totp_code(&secret) }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "complete");
    assert!(res.cookie_pair(&format!("access_token_{account_id}")).is_some());
}

#[tokio::test]
async fn temp_token_works_exactly_once() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("bob@example.com", "correct-password-1").await;
    let (secret, _) = enroll(&app, "bob@example.com", "correct-password-1", account_id).await;

    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "bob@example.com", "password": "correct-password-1" }),
        )
        .await;
    let temp_token = res.body["tempToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": totp_code(&secret) }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Consumed: even a fresh valid code fails on the same temp token.
    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": totp_code(&secret) }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn backup_code_is_single_use() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("carol@example.com", "correct-password-1").await;
    let (_, backup_codes) = enroll(&app, "carol@example.com", "correct-password-1", account_id).await;

    async fn login(app: &TestApp) -> String {
        let res = app
            .post_json(
                "/auth/login",
                json!({ "identifier": "carol@example.com", "password": "correct-password-1" }),
            )
            .await;
        res.body["tempToken"].as_str().unwrap().to_string()
    }

    let temp_token = login(&app).await;
    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": backup_codes[0] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    // Same code on a fresh challenge fails; an unused one still works.
    let temp_token = login(&app).await;
    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": backup_codes[0] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let temp_token = login(&app).await;
    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": backup_codes[1] }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn each_login_issues_a_fresh_temp_token() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("dave@example.com", "correct-password-1").await;
    enroll(&app, "dave@example.com", "correct-password-1", account_id).await;

    let body = json!({ "identifier": "dave@example.com", "password": "correct-password-1" });
    let first = app.post_json("/auth/login", body.clone()).await;
    let second = app.post_json("/auth/login", body).await;

    assert_ne!(first.body["tempToken"], second.body["tempToken"]);
}

#[tokio::test]
async fn wrong_code_is_rejected() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("eve@example.com", "correct-password-1").await;
    enroll(&app, "eve@example.com", "correct-password-1", account_id).await;

    let res = app
        .post_json(
            "/auth/login",
            json!({ "identifier": "eve@example.com", "password": "correct-password-1" }),
        )
        .await;
    let temp_token = res.body["tempToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            "/auth/2fa/verify",
            json!({ "tempToken": temp_token, "code": "not-a-code" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn enrollment_requires_a_session() {
    let app = TestApp::spawn();
    let account_id = app.signup_account("frank@example.com", "correct-password-1").await;

    let res = app
        .post_json("/auth/2fa/enable", json!({ "accountId": account_id }))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
