use account_service::{
    build_router,
    cache::TtlCache,
    config::AccountConfig,
    services::{
        EmailSender, GoogleProvider, LoginService, MockEmailSender, OAuthService, SignupService,
        SmtpEmailSender, TokenIssuer,
    },
    store::PgCredentialStore,
    AppState,
};
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AccountConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting account service"
    );

    let pool = account_service::db::create_pool(&config.database).await?;
    account_service::db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;

    let store = Arc::new(PgCredentialStore::new(pool));

    let email: Arc<dyn EmailSender> = if config.signup.mock_email {
        tracing::warn!("Mock email delivery enabled; tokens are returned in responses");
        Arc::new(MockEmailSender::new())
    } else {
        Arc::new(SmtpEmailSender::new(&config.smtp)?)
    };

    let tokens = TokenIssuer::new(&config.jwt.secret, config.jwt.refresh_token_expiry_days);

    let verification_cache = Arc::new(TtlCache::new());
    let temp_token_cache = Arc::new(TtlCache::new());

    let signup = SignupService::new(
        verification_cache.clone(),
        store.clone(),
        email,
        config.signup.clone(),
    );

    let login = LoginService::new(
        store.clone(),
        tokens.clone(),
        temp_token_cache.clone(),
        config.totp_issuer.clone(),
        config.jwt.temp_token_expiry_seconds,
    );

    let oauth = OAuthService::new(store.clone(), Arc::new(GoogleProvider::new(&config.google)));

    let state = AppState {
        config: config.clone(),
        store,
        tokens,
        signup,
        login,
        oauth,
        verification_cache,
        temp_token_cache,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
