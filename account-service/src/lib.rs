pub mod cache;
pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cache::TtlCache;
use crate::config::AccountConfig;
use crate::models::{TempTokenRecord, VerificationRecord};
use crate::services::{LoginService, OAuthService, SignupService, TokenIssuer};
use crate::store::CredentialStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AccountConfig,
    pub store: Arc<dyn CredentialStore>,
    pub tokens: TokenIssuer,
    pub signup: SignupService,
    pub login: LoginService,
    pub oauth: OAuthService,
    pub verification_cache: Arc<TtlCache<VerificationRecord>>,
    pub temp_token_cache: Arc<TtlCache<TempTokenRecord>>,
}

pub fn build_router(state: AppState) -> Router {
    // Introspection surface: every route runs behind the auth broker.
    let internal_routes = Router::new()
        .route(
            "/auth/verify-token",
            post(handlers::internal::verify_token),
        )
        .route("/auth/token-info", post(handlers::internal::token_info))
        .route("/users/search", get(handlers::internal::search_user))
        .route("/users/:account_id", get(handlers::internal::get_user))
        .route(
            "/session/validate",
            post(handlers::internal::validate_session),
        )
        .route("/session/info", get(handlers::internal::session_info))
        .route(
            "/session/accounts",
            get(handlers::internal::session_accounts),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::internal_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/auth/signup/email",
            post(handlers::signup::request_email_verification),
        )
        .route("/auth/signup/verify", get(handlers::signup::verify_email))
        .route(
            "/auth/signup/profile",
            post(handlers::signup::complete_profile),
        )
        .route("/auth/signup/cancel", post(handlers::signup::cancel_signup))
        .route("/auth/login", post(handlers::session::login))
        .route("/auth/2fa/verify", post(handlers::session::verify_two_factor))
        .route("/auth/2fa/enable", post(handlers::session::enable_two_factor))
        .route(
            "/auth/2fa/confirm",
            post(handlers::session::confirm_two_factor),
        )
        .route("/auth/refresh", post(handlers::session::refresh))
        .route("/auth/logout", post(handlers::session::logout))
        .route(
            "/auth/password-reset/request",
            post(handlers::signup::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::signup::confirm_password_reset),
        )
        .route("/auth/google", get(handlers::oauth::google_redirect))
        .route(
            "/auth/google/callback",
            get(handlers::oauth::google_callback),
        )
        .route(
            "/auth/google/scopes/check",
            post(handlers::oauth::check_scopes),
        )
        .nest("/internal", internal_routes)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
