use async_trait::async_trait;

use super::{AnalyticsSink, NotificationSink};

/// Emits notifications and analytics events as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, event: &str, metadata: serde_json::Value) -> anyhow::Result<()> {
        tracing::info!(target: "pubflow::notify", event, %metadata, "notification");
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for LogSink {
    async fn track(&self, event: &str, properties: serde_json::Value) -> anyhow::Result<()> {
        tracing::info!(target: "pubflow::analytics", event, %properties, "analytics event");
        Ok(())
    }
}
