//! Signup pipeline and password reset endpoints.

use service_core::{
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::auth::{
        CancelSignupRequest, CompleteProfileRequest, CompleteProfileResponse,
        PasswordResetConfirmRequest, PasswordResetRequest, PasswordResetResponse,
        SignupEmailRequest, SignupEmailResponse, TokenQuery, VerifyEmailResponse,
    },
    dtos::MessageResponse,
    services::ProfileData,
    utils::ValidatedJson,
    AppState,
};

pub async fn request_email_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let started = state
        .signup
        .request_email_verification(&req.email, &req.callback_url)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SignupEmailResponse {
            email: started.email,
            message: "Verification email sent".to_string(),
            token: started.token,
        }),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (profile_token, email) = state.signup.verify_email(&query.token).await?;

    Ok((
        StatusCode::OK,
        Json(VerifyEmailResponse {
            profile_token,
            email,
        }),
    ))
}

pub async fn complete_profile(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    ValidatedJson(req): ValidatedJson<CompleteProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let account = state
        .signup
        .complete_profile(
            &query.token,
            ProfileData {
                password: req.password,
                name: req.name,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CompleteProfileResponse {
            account: account.sanitized(),
            message: "Account created".to_string(),
        }),
    ))
}

pub async fn cancel_signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CancelSignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.signup.cancel_email_verification(&req.email).await;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Pending verification cancelled".to_string(),
        }),
    ))
}

/// Always answers 200 with the same message; the response never says whether
/// the address has an account.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state
        .signup
        .request_password_reset(&req.email, &req.callback_url)
        .await?;

    Ok((
        StatusCode::OK,
        Json(PasswordResetResponse {
            message: "If the address has an account, a reset email is on its way".to_string(),
            token,
        }),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .signup
        .confirm_password_reset(&req.token, &req.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password updated".to_string(),
        }),
    ))
}
