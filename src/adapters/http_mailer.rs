use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::MailConfig;
use crate::ports::{MailMessage, Mailer};

/// Reply body of the mail API.
#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Delivers mail through an HTTP mail API (Maileroo-style form post
/// authenticated with `X-API-Key`).
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    pub fn from_config(config: &MailConfig, timeout: Duration) -> Self {
        Self::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.from.clone(),
            timeout,
        )
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        let to = message.to.join(",");
        let form = [
            ("from", self.from.as_str()),
            ("to", to.as_str()),
            ("subject", message.subject.as_str()),
            ("plain", message.body.as_str()),
        ];

        let res = self
            .client
            .post(&self.api_url)
            .header("X-API-Key", &self.api_key)
            .form(&form)
            .send()
            .await
            .context("mail API request failed")?;

        let status = res.status();
        let reply: SendResponse = res
            .json()
            .await
            .with_context(|| format!("unreadable mail API response (HTTP {})", status))?;

        if !status.is_success() || !reply.success {
            anyhow::bail!(
                "mail API rejected message (HTTP {}): {}",
                status,
                reply.message.as_deref().unwrap_or("unknown error")
            );
        }

        tracing::info!(to = %to, subject = %message.subject, "Mail sent");
        Ok(())
    }
}
