use async_trait::async_trait;

use shipshape_common::alert::Alert;

use crate::config::SmsChannel;

use super::{ensure_success, ChannelSender, SenderError, HTTP_CLIENT};

const MAX_SMS_LEN: usize = 160;

/// Sends alert texts through a Twilio-compatible messaging API, one
/// form-encoded POST per recipient.
pub struct SmsSender {
    config: SmsChannel,
}

impl SmsSender {
    pub fn new(config: SmsChannel) -> Self {
        Self { config }
    }

    fn body(alert: &Alert) -> String {
        let full = format!(
            "[{}/{}] {}: {}",
            alert.severity, alert.category, alert.subject, alert.message
        );
        truncate_sms(&full)
    }
}

fn truncate_sms(text: &str) -> String {
    if text.chars().count() <= MAX_SMS_LEN {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_SMS_LEN - 3).collect();
    truncated.push_str("...");
    truncated
}

#[async_trait]
impl ChannelSender for SmsSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError> {
        let auth_token = self.config.auth_token.as_deref().ok_or_else(|| {
            SenderError::InvalidConfiguration(
                "sms channel has no auth token; set SHIPSHAPE_SMS_AUTH_TOKEN".to_string(),
            )
        })?;

        let body = Self::body(alert);
        for recipient in &self.config.to {
            let form = [
                ("From", self.config.from.as_str()),
                ("To", recipient.as_str()),
                ("Body", body.as_str()),
            ];
            let response = HTTP_CLIENT
                .post(&self.config.api_url)
                .basic_auth(&self.config.account_sid, Some(auth_token))
                .form(&form)
                .send()
                .await?;
            ensure_success("SMS", response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shipshape_common::alert::{AlertCategory, Severity};

    use super::*;

    #[test]
    fn short_messages_are_left_alone() {
        let alert = Alert::new(Severity::Warning, AlertCategory::Disk, "web-1", "low disk");
        assert_eq!(SmsSender::body(&alert), "[warning/disk] web-1: low disk");
    }

    #[test]
    fn long_messages_are_truncated_with_an_ellipsis() {
        let alert = Alert::new(
            Severity::Warning,
            AlertCategory::Disk,
            "web-1",
            "x".repeat(300),
        );
        let body = SmsSender::body(&alert);
        assert_eq!(body.chars().count(), MAX_SMS_LEN);
        assert!(body.ends_with("..."));
    }

    #[tokio::test]
    async fn missing_auth_token_is_an_invalid_configuration() {
        let sender = SmsSender::new(SmsChannel {
            api_url: "https://api.twilio.com/2010-04-01/Accounts/AC0/Messages.json".to_string(),
            account_sid: "AC0".to_string(),
            auth_token: None,
            from: "+15550100".to_string(),
            to: vec!["+15550199".to_string()],
        });
        let alert = Alert::new(Severity::Info, AlertCategory::Other, "shipshape", "test");
        let err = sender.send(&alert).await.unwrap_err();
        assert!(matches!(err, SenderError::InvalidConfiguration(_)));
    }
}
