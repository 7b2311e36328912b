use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use crate::config::SmtpConfig;
use crate::models::Organisation;
use crate::services::messages::{self, Locale, RenderedEmail};
use crate::services::ServiceError;

/// Outbound delivery of invite and password-reset tokens.
///
/// Links carry the token in the URL fragment so it never reaches server logs
/// or referrer headers; the client presents it back as a bearer token.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invite_email(
        &self,
        to_email: &str,
        organisation: &Organisation,
        invite_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError>;
}

fn invite_link(base_url: &str, token: &str) -> String {
    format!("{}/invite#token={}", base_url.trim_end_matches('/'), token)
}

fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/reset-password#token={}", base_url.trim_end_matches('/'), token)
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let mut builder = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e.to_string())))?
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        tracing::info!(host = %config.host, port = config.port, "Email service initialized with SMTP relay");

        Ok(Self {
            mailer: builder.build(),
            from_email: config.from.clone(),
        })
    }

    async fn send_email(&self, to_email: &str, message: RenderedEmail) -> Result<(), ServiceError> {
        let RenderedEmail {
            subject,
            plain_body,
            html_body,
        } = message;

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| ServiceError::Email(e.to_string()))?)
            .subject(subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| ServiceError::Email(e.to_string()))?;

        // SmtpTransport is blocking
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
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
impl EmailProvider for EmailService {
    async fn send_invite_email(
        &self,
        to_email: &str,
        organisation: &Organisation,
        invite_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        let message = messages::invite_message(
            &organisation.display_name,
            &invite_link(base_url, invite_token),
            locale,
        );
        self.send_email(to_email, message).await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        let message = messages::password_reset_message(&reset_link(base_url, reset_token), locale);
        self.send_email(to_email, message).await
    }
}

/// Logs links instead of sending them. Used when no SMTP host is configured.
#[derive(Clone)]
pub struct ConsoleEmailService;

#[async_trait]
impl EmailProvider for ConsoleEmailService {
    async fn send_invite_email(
        &self,
        to_email: &str,
        organisation: &Organisation,
        invite_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            to = %to_email,
            organisation = %organisation.short_name,
            locale = locale.as_str(),
            link = %invite_link(base_url, invite_token),
            "Invite email (console mailer)"
        );
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        tracing::info!(
            to = %to_email,
            locale = locale.as_str(),
            link = %reset_link(base_url, reset_token),
            "Password reset email (console mailer)"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentEmail {
    Invite {
        to: String,
        organisation_id: uuid::Uuid,
        token: String,
        locale: Locale,
    },
    PasswordReset {
        to: String,
        token: String,
        locale: Locale,
    },
}

/// Records every message for assertions in tests.
#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentEmail>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, email: SentEmail) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock mailer mutex poisoned: {}", e)))?
            .push(email);
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_invite_email(
        &self,
        to_email: &str,
        organisation: &Organisation,
        invite_token: &str,
        _base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::Invite {
            to: to_email.to_string(),
            organisation_id: organisation.id,
            token: invite_token.to_string(),
            locale,
        })
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        _base_url: &str,
        locale: Locale,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail::PasswordReset {
            to: to_email.to_string(),
            token: reset_token.to_string(),
            locale,
        })
    }
}
