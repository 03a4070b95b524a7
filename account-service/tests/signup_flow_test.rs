//! The three-step signup pipeline over the full router.

mod common;

use account_service::store::CredentialStore;
use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

fn email_step_body(email: &str) -> serde_json::Value {
    json!({ "email": email, "callbackUrl": "http://localhost:3000/verify" })
}

#[tokio::test]
async fn full_chain_creates_account() {
    let app = TestApp::spawn();

    let account_id = app.signup_account("alice@example.com", "correct-horse-battery").await;

    let stored = app
        .store
        .find_by_id(account_id)
        .await
        .unwrap()
        .expect("account persisted");
    assert_eq!(stored.user_details.email, "alice@example.com");
    assert!(stored.user_details.email_verified);
    assert!(stored.security.password_hash.is_some());
}

#[tokio::test]
async fn email_token_is_consumed_by_verification() {
    let app = TestApp::spawn();

    let res = app
        .post_json("/auth/signup/email", email_step_body("bob@example.com"))
        .await;
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    assert_eq!(res.status, StatusCode::OK);

    // The chain has moved on; the email token no longer exists.
    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn profile_token_cannot_be_replayed_after_account_creation() {
    let app = TestApp::spawn();

    let res = app
        .post_json("/auth/signup/email", email_step_body("carol@example.com"))
        .await;
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    let profile_token = res.body["profileToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            &format!("/auth/signup/profile?token={profile_token}"),
            json!({ "password": "long-enough-password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app
        .post_json(
            &format!("/auth/signup/profile?token={profile_token}"),
            json!({ "password": "long-enough-password" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn re_request_invalidates_earlier_token() {
    let app = TestApp::spawn();

    let first = app
        .post_json("/auth/signup/email", email_step_body("dave@example.com"))
        .await;
    let first_token = first.body["token"].as_str().unwrap().to_string();

    let second = app
        .post_json("/auth/signup/email", email_step_body("dave@example.com"))
        .await;
    let second_token = second.body["token"].as_str().unwrap().to_string();
    assert_ne!(first_token, second_token);

    let res = app
        .get(&format!("/auth/signup/verify?token={first_token}"))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .get(&format!("/auth/signup/verify?token={second_token}"))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn cancel_is_idempotent_and_kills_pending_tokens() {
    let app = TestApp::spawn();

    // Cancelling with nothing pending succeeds.
    let res = app
        .post_json("/auth/signup/cancel", json!({ "email": "eve@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let started = app
        .post_json("/auth/signup/email", email_step_body("eve@example.com"))
        .await;
    let token = started.body["token"].as_str().unwrap().to_string();

    let res = app
        .post_json("/auth/signup/cancel", json!({ "email": "eve@example.com" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_email_surfaces_conflict() {
    let app = TestApp::spawn();

    app.signup_account("frank@example.com", "first-password-123").await;

    // Second chain for the same address gets through verification but the
    // final step hits the uniqueness constraint.
    let res = app
        .post_json("/auth/signup/email", email_step_body("frank@example.com"))
        .await;
    let token = res.body["token"].as_str().unwrap().to_string();

    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    let profile_token = res.body["profileToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            &format!("/auth/signup/profile?token={profile_token}"),
            json!({ "password": "second-password-123" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["code"], "USER_EXISTS");
}

#[tokio::test]
async fn malformed_email_is_rejected_before_any_state_change() {
    let app = TestApp::spawn();

    let res = app
        .post_json("/auth/signup/email", email_step_body("not-an-email"))
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert!(app.state.verification_cache.is_empty());
}

#[tokio::test]
async fn short_password_is_rejected_and_token_survives() {
    let app = TestApp::spawn();

    let res = app
        .post_json("/auth/signup/email", email_step_body("grace@example.com"))
        .await;
    let token = res.body["token"].as_str().unwrap().to_string();
    let res = app.get(&format!("/auth/signup/verify?token={token}")).await;
    let profile_token = res.body["profileToken"].as_str().unwrap().to_string();

    let res = app
        .post_json(
            &format!("/auth/signup/profile?token={profile_token}"),
            json!({ "password": "short" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);

    // The profile token was not consumed by the failed attempt.
    let res = app
        .post_json(
            &format!("/auth/signup/profile?token={profile_token}"),
            json!({ "password": "long-enough-now-ok" }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
}
