use async_trait::async_trait;
use serde_json::json;

use shipshape_common::alert::{Alert, Severity};

use crate::config::SlackChannel;

use super::{ensure_success, render_body_template, ChannelSender, SenderError, HTTP_CLIENT};

/// Posts alerts to a Slack incoming webhook.
pub struct SlackSender {
    config: SlackChannel,
}

impl SlackSender {
    pub fn new(config: SlackChannel) -> Self {
        Self { config }
    }

    fn body(&self, alert: &Alert) -> Result<serde_json::Value, SenderError> {
        let text = match &self.config.body_template {
            Some(template) => render_body_template(template, alert)?,
            None => format!("*{}*\n{}", alert.subject, alert.message),
        };
        let emoji = match alert.severity {
            Severity::Info => ":information_source:",
            Severity::Warning => ":warning:",
            Severity::Critical => ":rotating_light:",
        };
        Ok(json!({
            // Fallback for surfaces that do not render blocks.
            "text": format!("[{}] {}", alert.severity, alert.subject),
            "blocks": [
                {
                    "type": "header",
                    "text": {
                        "type": "plain_text",
                        "text": format!("{emoji} {} alert", alert.severity),
                        "emoji": true,
                    }
                },
                {
                    "type": "section",
                    "text": { "type": "mrkdwn", "text": text }
                },
                {
                    "type": "context",
                    "elements": [
                        {
                            "type": "mrkdwn",
                            "text": format!(
                                "{} | {}",
                                alert.category,
                                alert.raised_at.to_rfc3339()
                            ),
                        }
                    ]
                }
            ]
        }))
    }
}

#[async_trait]
impl ChannelSender for SlackSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let body = self.body(alert)?;
        let response = HTTP_CLIENT
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;
        ensure_success("Slack", response).await
    }
}
