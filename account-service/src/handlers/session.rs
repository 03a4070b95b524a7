//! Login, 2FA, refresh and logout. Session cookies are per-account:
//! `access_token_{account_id}` always, `refresh_token_{account_id}` only
//! when the caller asked to be remembered.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::{
    axum::{
        extract::State,
        http::{header, HeaderMap, StatusCode},
        response::IntoResponse,
        Json,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::{
    dtos::auth::{
        LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse,
        TwoFactorConfirmRequest, TwoFactorEnableRequest, TwoFactorEnableResponse,
        TwoFactorVerifyRequest,
    },
    dtos::MessageResponse,
    models::Account,
    services::{LoginOutcome, TokenPair, TokenUse},
    utils::ValidatedJson,
    AppState,
};

pub fn access_cookie_name(account_id: Uuid) -> String {
    format!("access_token_{}", account_id)
}

pub fn refresh_cookie_name(account_id: Uuid) -> String {
    format!("refresh_token_{}", account_id)
}

fn build_cookie(name: String, value: String, max_age_seconds: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(max_age_seconds));
    cookie
}

/// Attach the session cookies for a freshly authenticated account.
pub fn apply_session_cookies(
    jar: CookieJar,
    state: &AppState,
    account: &Account,
    pair: &TokenPair,
) -> CookieJar {
    let mut jar = jar.add(build_cookie(
        access_cookie_name(account.account_id),
        pair.access_token.clone(),
        account.security.session_timeout_seconds,
    ));

    if let Some(refresh_token) = &pair.refresh_token {
        jar = jar.add(build_cookie(
            refresh_cookie_name(account.account_id),
            refresh_token.clone(),
            state.config.jwt.refresh_token_expiry_days * 24 * 3600,
        ));
    }

    jar
}

fn expired_cookie(name: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Require a live access token for `account_id`, from the Authorization
/// header or the account's session cookie.
fn require_session(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
    account_id: Uuid,
) -> Result<(), AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let cookie_token = jar
        .get(&access_cookie_name(account_id))
        .map(|c| c.value().to_string());

    let token = bearer
        .or(cookie_token)
        .ok_or_else(|| AppError::AuthFailed(anyhow::anyhow!("No session token presented")))?;

    let parsed = state
        .tokens
        .parse_expected(&token, TokenUse::Access)
        .map_err(|e| AppError::AuthFailed(anyhow::anyhow!("Session token rejected: {e}")))?;

    if parsed.account_id != account_id {
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Session token belongs to a different account"
        )));
    }

    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    match state.login.authenticate(&req.identifier, &req.password).await? {
        LoginOutcome::Complete(account) => {
            let pair = state.login.issue_session(&account, req.remember_me)?;
            let jar = apply_session_cookies(jar, &state, &account, &pair);
            Ok((
                jar,
                (
                    StatusCode::OK,
                    Json(LoginResponse::Complete {
                        account: account.sanitized(),
                    }),
                ),
            ))
        }
        LoginOutcome::TwoFactorRequired {
            account_id,
            temp_token,
        } => Ok((
            jar,
            (
                StatusCode::OK,
                Json(LoginResponse::TwoFactorRequired {
                    account_id,
                    temp_token,
                }),
            ),
        )),
    }
}

pub async fn verify_two_factor(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<TwoFactorVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .login
        .verify_two_factor(&req.temp_token, &req.code)
        .await?;

    let pair = state.login.issue_session(&account, req.remember_me)?;
    let jar = apply_session_cookies(jar, &state, &account, &pair);

    Ok((
        jar,
        (
            StatusCode::OK,
            Json(LoginResponse::Complete {
                account: account.sanitized(),
            }),
        ),
    ))
}

/// Exchange the refresh cookie for a fresh access cookie. The refresh token
/// itself is left as-is; it expires on its own schedule.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let refresh_token = jar
        .get(&refresh_cookie_name(req.account_id))
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::AuthFailed(anyhow::anyhow!("No refresh cookie presented")))?;

    let (account, access_token) = state.login.refresh_session(&refresh_token).await?;

    if account.account_id != req.account_id {
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Refresh token belongs to a different account"
        )));
    }

    let jar = jar.add(build_cookie(
        access_cookie_name(account.account_id),
        access_token,
        account.security.session_timeout_seconds,
    ));

    Ok((
        jar,
        (
            StatusCode::OK,
            Json(RefreshResponse {
                account: account.sanitized(),
                message: "Session refreshed".to_string(),
            }),
        ),
    ))
}

pub async fn logout(
    State(_state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let jar = jar
        .add(expired_cookie(access_cookie_name(req.account_id)))
        .add(expired_cookie(refresh_cookie_name(req.account_id)));

    Ok((
        jar,
        (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Logged out".to_string(),
            }),
        ),
    ))
}

pub async fn enable_two_factor(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<TwoFactorEnableRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_session(&state, &headers, &jar, req.account_id)?;

    let setup = state.login.enable_two_factor(req.account_id).await?;

    Ok((
        StatusCode::OK,
        Json(TwoFactorEnableResponse {
            secret: setup.secret,
            otpauth_url: setup.otpauth_url,
            backup_codes: setup.backup_codes,
        }),
    ))
}

pub async fn confirm_two_factor(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<TwoFactorConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    require_session(&state, &headers, &jar, req.account_id)?;

    state
        .login
        .confirm_two_factor(req.account_id, &req.code)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Two-factor authentication enabled".to_string(),
        }),
    ))
}
