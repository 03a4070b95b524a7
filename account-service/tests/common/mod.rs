//! Shared harness: the full router over an in-memory store with mock email
//! and a scripted OAuth provider. Requests go through `tower::oneshot`, so
//! the whole middleware stack is exercised without binding a socket.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::util::ServiceExt;

use account_service::{
    build_router,
    cache::TtlCache,
    config::{
        AccountConfig, DatabaseConfig, Environment, GoogleOAuthConfig, InternalAuthConfig,
        InternalPeer, JwtConfig, SignupConfig, SmtpConfig,
    },
    services::{
        LoginService, MockEmailSender, MockOAuthProvider, OAuthService, SignupService, TokenIssuer,
    },
    store::MemoryCredentialStore,
    AppState,
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-key-0123456789abcdef";
pub const INTERNAL_SERVICE_ID: &str = "billing";
pub const INTERNAL_SERVICE_SECRET: &str = "billing-shared-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryCredentialStore>,
    pub email: Arc<MockEmailSender>,
    pub oauth: Arc<MockOAuthProvider>,
}

fn test_config(allow_certificate_only: bool) -> AccountConfig {
    AccountConfig {
        environment: Environment::Dev,
        service_name: "account-service".to_string(),
        service_version: "test".to_string(),
        log_level: "warn".to_string(),
        port: 0,
        otlp_endpoint: None,
        allowed_origins: vec!["http://localhost:3000".to_string()],
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            refresh_token_expiry_days: 7,
            temp_token_expiry_seconds: 300,
        },
        signup: SignupConfig {
            verification_ttl_minutes: 30,
            profile_ttl_minutes: 30,
            reset_ttl_minutes: 15,
            mock_email: true,
        },
        google: GoogleOAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: "http://localhost:8080/auth/google/callback".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: "no-reply@localhost".to_string(),
        },
        internal: InternalAuthConfig {
            peers: vec![InternalPeer {
                service_id: INTERNAL_SERVICE_ID.to_string(),
                service_name: "Billing Service".to_string(),
                secret: INTERNAL_SERVICE_SECRET.to_string(),
            }],
            allow_certificate_only,
        },
        totp_issuer: "account-service".to_string(),
    }
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(false)
    }

    pub fn spawn_with(allow_certificate_only: bool) -> Self {
        let config = test_config(allow_certificate_only);

        let store = Arc::new(MemoryCredentialStore::new());
        let email = Arc::new(MockEmailSender::new());
        let oauth_provider = Arc::new(MockOAuthProvider::new());

        let tokens = TokenIssuer::new(&config.jwt.secret, config.jwt.refresh_token_expiry_days);
        let verification_cache = Arc::new(TtlCache::new());
        let temp_token_cache = Arc::new(TtlCache::new());

        let signup = SignupService::new(
            verification_cache.clone(),
            store.clone(),
            email.clone(),
            config.signup.clone(),
        );

        let login = LoginService::new(
            store.clone(),
            tokens.clone(),
            temp_token_cache.clone(),
            config.totp_issuer.clone(),
            config.jwt.temp_token_expiry_seconds,
        );

        let oauth = OAuthService::new(store.clone(), oauth_provider.clone());

        let state = AppState {
            config,
            store: store.clone(),
            tokens,
            signup,
            login,
            oauth,
            verification_cache,
            temp_token_cache,
        };

        TestApp {
            router: build_router(state.clone()),
            state,
            store,
            email,
            oauth: oauth_provider,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router call failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("bad request"),
        )
        .await
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> TestResponse {
        self.request(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("bad request"),
        )
        .await
    }

    pub async fn post_json_with_headers(
        &self,
        path: &str,
        body: serde_json::Value,
        extra: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::from(body.to_string())).expect("bad request"))
            .await
    }

    pub async fn get_with_headers(&self, path: &str, extra: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().uri(path);
        for (name, value) in extra {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).expect("bad request"))
            .await
    }

    /// Run the signup pipeline to completion and return the account id.
    pub async fn signup_account(&self, email: &str, password: &str) -> uuid::Uuid {
        let res = self
            .post_json(
                "/auth/signup/email",
                serde_json::json!({
                    "email": email,
                    "callbackUrl": "http://localhost:3000/verify",
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "signup email step: {:?}", res.body);
        let token = res.body["token"].as_str().expect("mock token").to_string();

        let res = self.get(&format!("/auth/signup/verify?token={token}")).await;
        assert_eq!(res.status, StatusCode::OK, "verify step: {:?}", res.body);
        let profile_token = res.body["profileToken"].as_str().unwrap().to_string();

        let res = self
            .post_json(
                &format!("/auth/signup/profile?token={profile_token}"),
                serde_json::json!({ "password": password, "name": "Test User" }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "profile step: {:?}", res.body);

        res.body["account"]["accountId"]
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .expect("account id in response")
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    /// All Set-Cookie values on the response.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// The `name=value` pair of a named cookie, if the response set it.
    pub fn cookie_pair(&self, name: &str) -> Option<String> {
        self.set_cookies()
            .iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .and_then(|c| c.split(';').next().map(str::to_string))
    }
}
