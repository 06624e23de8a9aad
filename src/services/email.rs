//! Outgoing mail. Delivery is fire-and-forget from the engines' point of view:
//! a failed send is logged by the caller and never undoes a state change.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

/// Mail sent to a book owner when a friend asks to borrow a book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRequestEmail {
    pub to_email: String,
    pub to_name: String,
    pub requester_name: String,
    pub book_title: String,
}

impl BookRequestEmail {
    pub fn subject(&self) -> String {
        format!("{} would like to borrow \"{}\"", self.requester_name, self.book_title)
    }

    pub fn body(&self) -> String {
        format!(
            r#"
Hi {to_name},

{requester} would like to borrow your copy of "{title}".

Open your Shelfshare notifications to approve or decline the request.
"#,
            to_name = self.to_name,
            requester = self.requester_name,
            title = self.book_title
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_book_request_email(&self, email: &BookRequestEmail) -> AppResult<()>;
}

/// Builds the configured mailer: SMTP when enabled, log-only otherwise
pub fn from_config(config: &EmailConfig) -> std::sync::Arc<dyn Mailer> {
    if config.enabled {
        std::sync::Arc::new(SmtpMailer::new(config.clone()))
    } else {
        std::sync::Arc::new(DisabledMailer)
    }
}

/// Mailer used when email delivery is switched off
#[derive(Clone, Copy, Default)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_book_request_email(&self, email: &BookRequestEmail) -> AppResult<()> {
        tracing::debug!(to = %email.to_email, subject = %email.subject(), "Email disabled, not sending");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Shelfshare");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(format!(
                                r#"<html><body><pre>{}</pre></body></html>"#,
                                body.replace('\n', "<br>")
                            )),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            builder
        };

        Ok(builder.build())
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let email = self.build_message(to, subject, body)?;
        let mailer = self.transport()?;

        // lettre's SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Mail task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_book_request_email(&self, email: &BookRequestEmail) -> AppResult<()> {
        let to = format!("{} <{}>", email.to_name, email.to_email);
        self.send_email(&to, &email.subject(), &email.body()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BookRequestEmail {
        BookRequestEmail {
            to_email: "owner@example.org".to_string(),
            to_name: "Olga".to_string(),
            requester_name: "Ben".to_string(),
            book_title: "Dune".to_string(),
        }
    }

    #[test]
    fn book_request_text_names_requester_and_title() {
        let email = request();
        assert_eq!(email.subject(), "Ben would like to borrow \"Dune\"");
        assert!(email.body().contains("Hi Olga"));
    }

    #[test]
    fn message_builds_with_display_name_recipient() {
        let mailer = SmtpMailer::new(EmailConfig::default());
        let email = request();
        let built = mailer.build_message(
            &format!("{} <{}>", email.to_name, email.to_email),
            &email.subject(),
            &email.body(),
        );
        assert!(built.is_ok());
    }

    #[tokio::test]
    async fn disabled_mailer_accepts_everything() {
        assert!(DisabledMailer.send_book_request_email(&request()).await.is_ok());
    }
}
