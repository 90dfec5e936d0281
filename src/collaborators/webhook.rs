use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::NotificationSink;

/// Posts notifications as JSON to a webhook (e.g. a chat incoming-webhook).
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'a str,
    text: String,
    metadata: &'a serde_json::Value,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn summary(event: &str, metadata: &serde_json::Value) -> String {
    match metadata.get("submission_version_id").and_then(|v| v.as_str()) {
        Some(id) => format!("{event}: submission version {id}"),
        None => event.to_string(),
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, event: &str, metadata: serde_json::Value) -> anyhow::Result<()> {
        let payload = WebhookPayload {
            event,
            text: summary(event, &metadata),
            metadata: &metadata,
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            bail!("webhook returned status {}: {body}", status.as_u16());
        }
        Ok(())
    }
}
