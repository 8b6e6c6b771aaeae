use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::core::config::SmsConfig;

/// Outbound SMS transport used by `send_sms` steps.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<()>;
}

/// Writes the message to the log instead of sending it.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        info!(to = %to, chars = body.chars().count(), "SMS (log only): {}", body);
        Ok(())
    }
}

/// Posts `{ "to", "body", "from" }` JSON to an HTTP gateway.
pub struct HttpSmsGateway {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    sender: String,
}

impl HttpSmsGateway {
    pub fn new(url: &str, token: Option<String>, sender: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.trim().to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            sender: sender.to_string(),
        })
    }
}

#[async_trait]
impl SmsSender for HttpSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "to": to, "body": body, "from": self.sender }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.trim());
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("SMS gateway returned {}: {}", status, text.trim());
        }
        info!(to = %to, "SMS sent through gateway");
        Ok(())
    }
}

/// The gateway when one is configured, the log sender otherwise.
pub fn from_config(config: &SmsConfig) -> Result<Box<dyn SmsSender>> {
    match &config.gateway_url {
        Some(url) => Ok(Box::new(HttpSmsGateway::new(
            url,
            config.gateway_token.clone(),
            &config.sender,
        )?)),
        None => Ok(Box::new(LogSmsSender)),
    }
}
