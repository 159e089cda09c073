use std::time::Duration;

use base64::prelude::*;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Posts transactional mail to the configured HTTP relay. CVs travel
/// as base64 attachments and are never written to disk.
#[derive(Clone)]
pub struct MailerService {
    client: Client,
    relay_url: String,
    user: String,
    pass: String,
}

impl MailerService {
    pub fn new(relay_url: String, user: String, pass: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client for mailer");
        Self {
            client,
            relay_url,
            user,
            pass,
        }
    }

    pub async fn send_application(
        &self,
        to: &str,
        offer_title: &str,
        candidate_name: &str,
        candidate_email: &str,
        introduction: Option<&str>,
        cv_filename: &str,
        cv_data: &[u8],
    ) -> Result<()> {
        let mut text = format!(
            "{} ({}) applied for \"{}\".",
            candidate_name, candidate_email, offer_title
        );
        if let Some(intro) = introduction {
            let intro = intro.trim();
            if !intro.is_empty() {
                text.push_str("\n\n");
                text.push_str(intro);
            }
        }

        let payload = json!({
            "from": self.user,
            "to": to,
            "subject": format!("New application for \"{}\"", offer_title),
            "text": text,
            "attachments": [{
                "filename": cv_filename,
                "content": BASE64_STANDARD.encode(cv_data),
            }],
        });
        self.post(&payload, "application mail").await
    }

    pub async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<()> {
        let payload = json!({
            "from": self.user,
            "to": to,
            "subject": "Reset your password",
            "text": format!(
                "A password reset was requested for your account.\n\n\
                 Use the link below within one hour to choose a new password:\n{}\n\n\
                 If you did not request this, you can ignore this message.",
                reset_link
            ),
        });
        self.post(&payload, "password reset mail").await
    }

    async fn post(&self, payload: &serde_json::Value, context: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.relay_url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::internal("Failed to send email", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Mail relay rejected {}", context);
            return Err(Error::Internal("Failed to send email".to_string()));
        }

        info!("Sent {} via mail relay", context);
        Ok(())
    }
}
