// # Email Notifier
//
// Sends one plain-text summary of the run's uploaded publications to every
// configured recipient over SMTP with STARTTLS.
//
// ## Security Requirements
//
// - The SMTP password is read from the environment at send time
// - The password NEVER appears in logs or Debug output

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use pubwatch_core::config::NotifierConfig;
use pubwatch_core::traits::{Notifier, NotifierFactory};
use pubwatch_core::{EmailSettings, Error, ProviderRegistry, Publication, Result};
use std::time::Duration;

/// SMTP command timeout (30 seconds)
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Email notifier
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    smtp_server: String,
    smtp_port: u16,
    sender_email: String,
    recipients: Vec<String>,

    /// Name of the environment variable holding the SMTP password
    password_env: String,
}

impl EmailNotifier {
    /// Create a notifier from its settings; the password is not read yet
    pub fn new(settings: &EmailSettings) -> Self {
        Self {
            smtp_server: settings.smtp_server.clone(),
            smtp_port: settings.smtp_port,
            sender_email: settings.sender_email.clone(),
            recipients: settings.recipients.clone(),
            password_env: settings.password_env.clone(),
        }
    }

    /// Build the summary message
    pub fn compose(&self, publications: &[Publication]) -> Result<Message> {
        let from: Mailbox = self
            .sender_email
            .parse()
            .map_err(|e| Error::notifier(format!("Invalid sender '{}': {}", self.sender_email, e)))?;

        let mut builder = Message::builder()
            .from(from)
            .subject(subject(publications))
            .header(header::ContentType::TEXT_PLAIN);

        for recipient in &self.recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| Error::notifier(format!("Invalid recipient '{}': {}", recipient, e)))?;
            builder = builder.to(to);
        }

        builder
            .body(body(publications))
            .map_err(|e| Error::notifier(format!("Failed to build message: {}", e)))
    }

    async fn send(&self, publications: &[Publication]) -> Result<()> {
        let password = std::env::var(&self.password_env).map_err(|_| {
            Error::config(format!(
                "SMTP password variable {} is not set",
                self.password_env
            ))
        })?;

        let message = self.compose(publications)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp_server)
            .map_err(|e| Error::notifier(format!("Invalid SMTP server: {}", e)))?
            .port(self.smtp_port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(self.sender_email.clone(), password))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| Error::notifier(format!("SMTP delivery failed: {}", e)))?;

        Ok(())
    }
}

/// `New Publications Found (<n>)`
pub fn subject(publications: &[Publication]) -> String {
    format!("New Publications Found ({})", publications.len())
}

/// Plain-text listing of the publications
pub fn body(publications: &[Publication]) -> String {
    let mut body = String::from("The following new publications have been found:\n\n");
    for publication in publications {
        body.push_str(&format!(
            "- {} by {}\n  Published on: {}\n  Pages: {}\n  URL: {}\n\n",
            publication.title,
            publication.publisher,
            publication.date_iso(),
            publication.page_count,
            publication.url
        ));
    }
    body
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, publications: &[Publication]) -> bool {
        if publications.is_empty() {
            return true;
        }

        match self.send(publications).await {
            Ok(()) => {
                tracing::info!(
                    "Emailed {} publication(s) to {} recipient(s)",
                    publications.len(),
                    self.recipients.len()
                );
                true
            }
            Err(e) => {
                tracing::error!("Error sending email notification: {}", e);
                false
            }
        }
    }

    fn notifier_name(&self) -> &'static str {
        "email"
    }
}

/// Factory for creating email notifiers
pub struct EmailFactory;

impl NotifierFactory for EmailFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Email(settings) => {
                if std::env::var_os(&settings.password_env).is_none() {
                    tracing::warn!(
                        "{} is not set; email notifications will fail",
                        settings.password_env
                    );
                }
                Ok(Box::new(EmailNotifier::new(settings)))
            }
            _ => Err(Error::config("Invalid config for email notifier")),
        }
    }
}

/// Register the email notifier with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_notifier("email", Box::new(EmailFactory));
}
