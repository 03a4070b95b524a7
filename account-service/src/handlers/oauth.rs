//! Google OAuth entry points and the scope reconciliation check.

use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Redirect},
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::auth::{OAuthCallbackQuery, ScopeCheckRequest, ScopeCheckResponse},
    handlers::session::apply_session_cookies,
    utils::ValidatedJson,
    AppState,
};

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Send the browser to Google's consent screen.
pub async fn google_redirect(State(state): State<AppState>) -> impl IntoResponse {
    let google = &state.config.google;
    let url = format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        GOOGLE_AUTHORIZE_URL,
        urlencoding::encode(&google.client_id),
        urlencoding::encode(&google.redirect_uri),
        urlencoding::encode("openid email profile"),
    );
    Redirect::temporary(&url)
}

/// Handle the provider's redirect back: exchange the code, upsert the
/// account, record the granted scopes, establish the session, then bounce
/// to the frontend.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let frontend = &state.config.google.frontend_url;

    if let Some(error) = query.error {
        tracing::warn!(error = %error, "OAuth consent denied or failed");
        let url = format!("{}?error={}", frontend, urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&url)));
    }

    let Some(code) = query.code else {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Callback carried neither code nor error"
        )));
    };

    let (account, _tokens, is_new) = state
        .oauth
        .exchange_code(&code, &state.config.google.redirect_uri)
        .await?;

    // OAuth sessions are remembered: the provider consent already implies a
    // durable grant.
    let pair = state.login.issue_session(&account, true)?;
    let jar = apply_session_cookies(jar, &state, &account, &pair);

    let url = format!(
        "{}?accountId={}&newAccount={}",
        frontend, account.account_id, is_new
    );
    Ok((jar, Redirect::temporary(&url)))
}

/// Compare the scopes a live provider token carries against everything this
/// account ever granted. Ownership is checked first so one account cannot
/// probe another's grant history.
pub async fn check_scopes(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ScopeCheckRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ownership = state
        .oauth
        .verify_token_ownership(&req.access_token, req.account_id)
        .await?;

    if !ownership.is_valid {
        return Err(AppError::AuthFailed(anyhow::anyhow!(
            "Token ownership check failed: {}",
            ownership.reason.unwrap_or_default()
        )));
    }

    let check = state
        .oauth
        .check_for_additional_scopes(req.account_id, &req.access_token)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ScopeCheckResponse {
            needs_additional_scopes: check.needs_additional_scopes,
            missing_scopes: check.missing_scopes,
        }),
    ))
}
