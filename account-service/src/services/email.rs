//! Outbound email boundary. Delivery is fire-and-forget from the pipelines'
//! perspective; failures are logged, never surfaced to the requester.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::services::ServiceError;

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::Email(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email sender initialized");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| {
                        ServiceError::Email(e.to_string())
                    })?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        // SMTP send is blocking; keep it off the async runtime.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(ServiceError::Email(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError> {
        let link = format!("{callback_url}?token={token}");
        let plain = format!(
            "Welcome! Confirm your email address by opening this link:\n\n{link}\n\n\
             The link expires shortly. If you did not sign up, ignore this email."
        );
        let html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
<h2>Welcome! Please verify your email</h2>
<p><a href="{link}">Verify email address</a></p>
<p>The link expires shortly. If you did not sign up, ignore this email.</p>
</body></html>"#
        );
        self.send_email(to_email, "Verify your email address", &plain, &html)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError> {
        let link = format!("{callback_url}?token={token}");
        let plain = format!(
            "A password reset was requested for this address.\n\n{link}\n\n\
             The link expires shortly. If you did not request a reset, ignore this email."
        );
        let html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
<h2>Reset your password</h2>
<p><a href="{link}">Choose a new password</a></p>
<p>The link expires shortly. If you did not request a reset, ignore this email.</p>
</body></html>"#
        );
        self.send_email(to_email, "Reset your password", &plain, &html)
            .await
    }
}

/// Captured outbound message, for assertions in tests.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub template: &'static str,
    pub token: String,
    pub callback_url: String,
}

#[derive(Default)]
pub struct MockEmailSender {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmailSender for MockEmailSender {
    async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("mock mutex poisoned: {e}")))?
            .push(SentEmail {
                to: to_email.to_string(),
                template: "verification",
                token: token.to_string(),
                callback_url: callback_url.to_string(),
            });
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
        callback_url: &str,
    ) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("mock mutex poisoned: {e}")))?
            .push(SentEmail {
                to: to_email.to_string(),
                template: "password_reset",
                token: token.to_string(),
                callback_url: callback_url.to_string(),
            });
        Ok(())
    }
}
