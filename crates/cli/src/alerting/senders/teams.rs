use async_trait::async_trait;
use serde_json::json;

use shipshape_common::alert::{Alert, Severity};

use crate::config::TeamsChannel;

use super::{ensure_success, render_body_template, ChannelSender, SenderError, HTTP_CLIENT};

/// Posts alerts to a Microsoft Teams incoming webhook as a MessageCard.
pub struct TeamsSender {
    config: TeamsChannel,
}

impl TeamsSender {
    pub fn new(config: TeamsChannel) -> Self {
        Self { config }
    }

    fn body(&self, alert: &Alert) -> Result<serde_json::Value, SenderError> {
        let text = match &self.config.body_template {
            Some(template) => render_body_template(template, alert)?,
            None => alert.message.clone(),
        };
        let theme_color = match alert.severity {
            Severity::Info => "2EB67D",
            Severity::Warning => "ECB22E",
            Severity::Critical => "E01E5A",
        };
        Ok(json!({
            "@type": "MessageCard",
            "@context": "http://schema.org/extensions",
            "themeColor": theme_color,
            "summary": format!("[{}] {}", alert.severity, alert.subject),
            "sections": [
                {
                    "activityTitle": format!("{} alert: {}", alert.severity, alert.subject),
                    "facts": [
                        { "name": "Severity", "value": alert.severity.as_str() },
                        { "name": "Category", "value": alert.category.as_str() },
                        { "name": "Subject", "value": &alert.subject },
                        { "name": "Raised", "value": alert.raised_at.to_rfc3339() },
                    ],
                    "text": text,
                }
            ]
        }))
    }
}

#[async_trait]
impl ChannelSender for TeamsSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let body = self.body(alert)?;
        let response = HTTP_CLIENT
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;
        ensure_success("Teams", response).await
    }
}
