use color_eyre::Result;
use serde::Serialize;

use crate::config::EmailConfig;
use crate::services::notify::{EmailSender, OutgoingEmail};

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// Sends mail through a Resend-compatible HTTP API.
#[derive(Clone)]
pub struct ResendEmailSender {
    client: reqwest::Client,
    config: EmailConfig,
}

impl ResendEmailSender {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl EmailSender for ResendEmailSender {
    fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        if !self.is_enabled() {
            tracing::info!("email disabled, not sending '{}'", email.subject);
            return Ok(());
        }

        let body = SendEmailRequest {
            from: &self.config.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };

        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("mail API error: {status} - {text}");
            color_eyre::eyre::bail!("mail API returned {status}");
        }

        tracing::info!("email '{}' sent to {} recipient(s)", email.subject, email.to.len());
        Ok(())
    }
}
