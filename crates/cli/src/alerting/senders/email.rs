use async_trait::async_trait;
use serde::Serialize;

use shipshape_common::alert::Alert;

use crate::config::EmailChannel;

use super::{ensure_success, ChannelSender, SenderError, HTTP_CLIENT};

/// Sends alert mail through a SendGrid-compatible HTTP API.
pub struct EmailSender {
    config: EmailChannel,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: String,
    content: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: String,
}

impl EmailSender {
    pub fn new(config: EmailChannel) -> Self {
        Self { config }
    }

    fn payload<'a>(&'a self, alert: &Alert) -> MailPayload<'a> {
        MailPayload {
            personalizations: vec![Personalization {
                to: self
                    .config
                    .to
                    .iter()
                    .map(|email| Address { email })
                    .collect(),
            }],
            from: Address {
                email: &self.config.from,
            },
            subject: format!("[{}] {}", alert.severity, alert.subject),
            content: vec![Content {
                content_type: "text/plain",
                value: format!(
                    "{}\n\nCategory: {}\nRaised: {}",
                    alert.message,
                    alert.category,
                    alert.raised_at.to_rfc3339()
                ),
            }],
        }
    }
}

#[async_trait]
impl ChannelSender for EmailSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            SenderError::InvalidConfiguration(
                "email channel has no API key; set SHIPSHAPE_EMAIL_API_KEY".to_string(),
            )
        })?;

        let payload = self.payload(alert);
        let response = HTTP_CLIENT
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        ensure_success("Email", response).await
    }
}

#[cfg(test)]
mod tests {
    use shipshape_common::alert::{AlertCategory, Severity};

    use super::*;

    fn channel() -> EmailChannel {
        EmailChannel {
            api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            api_key: None,
            from: "alerts@example.com".to_string(),
            to: vec!["ops@example.com".to_string()],
        }
    }

    #[test]
    fn payload_matches_the_mail_api_shape() {
        let sender = EmailSender::new(channel());
        let alert = Alert::new(
            Severity::Critical,
            AlertCategory::Service,
            "web-1/nginx",
            "service nginx is stopped",
        );
        let value = serde_json::to_value(sender.payload(&alert)).unwrap();

        assert_eq!(value["personalizations"][0]["to"][0]["email"], "ops@example.com");
        assert_eq!(value["from"]["email"], "alerts@example.com");
        assert_eq!(value["subject"], "[critical] web-1/nginx");
        assert_eq!(value["content"][0]["type"], "text/plain");
        let body = value["content"][0]["value"].as_str().unwrap();
        assert!(body.starts_with("service nginx is stopped"));
        assert!(body.contains("Category: service"));
        assert!(body.contains("Raised: "));
    }

    #[tokio::test]
    async fn missing_api_key_is_an_invalid_configuration() {
        let sender = EmailSender::new(channel());
        let alert = Alert::new(Severity::Info, AlertCategory::Other, "shipshape", "test");
        let err = sender.send(&alert).await.unwrap_err();
        assert!(matches!(err, SenderError::InvalidConfiguration(_)));
    }
}
