//! Introspection surface for trusted peer services. Every handler here runs
//! behind `internal_auth_middleware`; `CurrentService` is the authenticated
//! caller.

use axum_extra::extract::cookie::CookieJar;
use service_core::{
    axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};
use uuid::Uuid;

use crate::{
    dtos::internal::{
        SessionAccountsResponse, SessionInfo, SessionValidateRequest, SessionValidateResponse,
        TokenIntrospectionResponse, UserSearchQuery, VerifyTokenRequest,
    },
    middleware::CurrentService,
    services::{TokenError, TokenUse},
    utils::ValidatedJson,
    AppState,
};

fn parse_token_use(s: Option<&str>) -> Result<TokenUse, AppError> {
    match s.unwrap_or("access") {
        "access" => Ok(TokenUse::Access),
        "refresh" => Ok(TokenUse::Refresh),
        "temp" => Ok(TokenUse::Temp),
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unknown token type: {}",
            other
        ))),
    }
}

/// Introspection in the RFC 7662 style: always 200, `active=false` with a
/// reason when the token fails verification.
pub async fn verify_token(
    State(state): State<AppState>,
    CurrentService(caller): CurrentService,
    ValidatedJson(req): ValidatedJson<VerifyTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let expected = parse_token_use(req.token_type.as_deref())?;

    let response = match state.tokens.parse_expected(&req.token, expected) {
        Ok(parsed) => TokenIntrospectionResponse {
            active: true,
            account_id: Some(parsed.account_id),
            token_use: Some(parsed.token_use.as_str().to_string()),
            expires_at: Some(parsed.expires_at),
            issued_at: Some(parsed.issued_at),
            reason: None,
        },
        Err(e) => {
            tracing::debug!(
                caller = %caller.service_id,
                error = %e,
                "Token introspection negative"
            );
            TokenIntrospectionResponse {
                active: false,
                account_id: None,
                token_use: None,
                expires_at: None,
                issued_at: None,
                reason: Some(match e {
                    TokenError::Expired => "expired".to_string(),
                    TokenError::Invalid => "invalid".to_string(),
                }),
            }
        }
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Strict variant: claims for a valid token, an error status otherwise.
pub async fn token_info(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    ValidatedJson(req): ValidatedJson<VerifyTokenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let expected = parse_token_use(req.token_type.as_deref())?;

    let parsed = state
        .tokens
        .parse_expected(&req.token, expected)
        .map_err(|e| match e {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid => AppError::TokenInvalid(anyhow::anyhow!("Token rejected")),
        })?;

    Ok((
        StatusCode::OK,
        Json(TokenIntrospectionResponse {
            active: true,
            account_id: Some(parsed.account_id),
            token_use: Some(parsed.token_use.as_str().to_string()),
            expires_at: Some(parsed.expires_at),
            issued_at: Some(parsed.issued_at),
            reason: None,
        }),
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    Path(account_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .store
        .find_by_id(account_id)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::UserNotFound)?;

    Ok((StatusCode::OK, Json(account.sanitized())))
}

pub async fn search_user(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    Query(query): Query<UserSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .store
        .find_by_email(&query.email)
        .await
        .map_err(AppError::from)?
        .ok_or(AppError::UserNotFound)?;

    Ok((StatusCode::OK, Json(account.sanitized())))
}

/// Does this access token represent a live session for this account?
pub async fn validate_session(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    ValidatedJson(req): ValidatedJson<SessionValidateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = match state.tokens.parse_expected(&req.access_token, TokenUse::Access) {
        Ok(parsed) if parsed.account_id == req.account_id => SessionValidateResponse {
            valid: true,
            reason: None,
        },
        Ok(_) => SessionValidateResponse {
            valid: false,
            reason: Some("token belongs to a different account".to_string()),
        },
        Err(TokenError::Expired) => SessionValidateResponse {
            valid: false,
            reason: Some("expired".to_string()),
        },
        Err(TokenError::Invalid) => SessionValidateResponse {
            valid: false,
            reason: Some("invalid".to_string()),
        },
    };

    Ok((StatusCode::OK, Json(response)))
}

/// Collect every live session on the forwarded Cookie header.
fn live_sessions(state: &AppState, jar: &CookieJar) -> Vec<SessionInfo> {
    let mut sessions = Vec::new();
    for cookie in jar.iter() {
        let Some(raw_id) = cookie.name().strip_prefix("access_token_") else {
            continue;
        };
        let Ok(account_id) = Uuid::parse_str(raw_id) else {
            continue;
        };
        if let Ok(parsed) = state.tokens.parse_expected(cookie.value(), TokenUse::Access) {
            if parsed.account_id == account_id {
                sessions.push(SessionInfo {
                    account_id,
                    expires_at: parsed.expires_at,
                    issued_at: parsed.issued_at,
                });
            }
        }
    }
    sessions
}

/// Session details for the forwarded Cookie header. With several live
/// sessions the one expiring last wins; none at all is a 404.
pub async fn session_info(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let session = live_sessions(&state, &jar)
        .into_iter()
        .max_by_key(|s| s.expires_at)
        .ok_or(AppError::UserNotFound)?;

    Ok((StatusCode::OK, Json(session)))
}

/// All accounts with a live access-token cookie on this request.
pub async fn session_accounts(
    State(state): State<AppState>,
    CurrentService(_caller): CurrentService,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let account_ids = live_sessions(&state, &jar)
        .into_iter()
        .map(|s| s.account_id)
        .collect();

    Ok((StatusCode::OK, Json(SessionAccountsResponse { account_ids })))
}
