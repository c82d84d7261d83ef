//! Transactional email via the SendGrid v3 REST API.
//!
//! When no API key is configured, messages are written to the `mail_outbox`
//! table instead so local development and tests can inspect them. Delivery is
//! best-effort throughout: callers log failures and carry on.

use serde_json::json;

use crate::db::Repository;
use crate::errors::AppError;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Outgoing mail sender.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    api_key: Option<String>,
    from: String,
    repo: Repository,
}

impl Mailer {
    pub fn new(api_key: Option<String>, from: String, repo: Repository) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            from,
            repo,
        }
    }

    /// Send a templated message, or park it in the outbox when unconfigured.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        template: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        let Some(api_key) = &self.api_key else {
            tracing::debug!("SendGrid not configured; writing {} mail to outbox", template);
            return self.repo.insert_mail(recipient, subject, template, payload).await;
        };

        let body = json!({
            "personalizations": [{
                "to": [{ "email": recipient }],
                "dynamic_template_data": payload,
            }],
            "from": { "email": self.from },
            "subject": subject,
            "template_id": template,
        });

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("SendGrid request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "SendGrid rejected mail ({}): {}",
                status, text
            )));
        }
        Ok(())
    }

    /// Best-effort send: log and swallow any failure.
    pub async fn send_best_effort(
        &self,
        recipient: &str,
        subject: &str,
        template: &str,
        payload: &serde_json::Value,
    ) {
        if let Err(e) = self.send(recipient, subject, template, payload).await {
            tracing::warn!("Failed to send {} mail to {}: {}", template, recipient, e);
        }
    }
}
