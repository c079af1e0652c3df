use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use tera::{Context, Tera};
use thiserror::Error;

use shipshape_common::alert::Alert;

pub mod email;
pub mod slack;
pub mod sms;
pub mod teams;

/// One client shared by all channel senders.
pub(crate) static HTTP_CLIENT: Lazy<Client> = Lazy::new(Client::new);

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Failed to send alert: {0}")]
    SendFailed(String),
    #[error("Invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Templating error: {0}")]
    TemplatingError(String),
}

/// A trait for delivering one alert to a specific channel type.
#[async_trait]
pub trait ChannelSender {
    async fn send(&self, alert: &Alert) -> Result<(), SenderError>;
}

/// Renders a user-supplied body template against the alert's fields. The
/// template sees `severity`, `category`, `subject`, `message` and
/// `timestamp`.
pub(crate) fn render_body_template(template: &str, alert: &Alert) -> Result<String, SenderError> {
    let mut context = Context::new();
    context.insert("severity", alert.severity.as_str());
    context.insert("category", alert.category.as_str());
    context.insert("subject", &alert.subject);
    context.insert("message", &alert.message);
    context.insert("timestamp", &alert.raised_at.to_rfc3339());
    Tera::one_off(template, &context, true).map_err(|e| SenderError::TemplatingError(e.to_string()))
}

pub(crate) async fn ensure_success(
    channel: &str,
    response: Response,
) -> Result<(), SenderError> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(SenderError::SendFailed(format!(
            "{channel} API returned non-success status: {status}. Body: {error_body}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use shipshape_common::alert::{AlertCategory, Severity};

    use super::*;

    #[test]
    fn body_template_sees_all_alert_fields() {
        let alert = Alert::new(
            Severity::Critical,
            AlertCategory::Service,
            "web-1/nginx",
            "service nginx is stopped",
        );
        let body = render_body_template(
            "[{{ severity }}/{{ category }}] {{ subject }}: {{ message }}",
            &alert,
        )
        .unwrap();
        assert_eq!(body, "[critical/service] web-1/nginx: service nginx is stopped");
    }

    #[test]
    fn broken_template_reports_a_templating_error() {
        let alert = Alert::new(Severity::Info, AlertCategory::Other, "shipshape", "test");
        let err = render_body_template("{{ message", &alert).unwrap_err();
        assert!(matches!(err, SenderError::TemplatingError(_)));
    }

    #[test]
    fn unknown_template_variable_is_an_error() {
        let alert = Alert::new(Severity::Info, AlertCategory::Other, "shipshape", "test");
        let err = render_body_template("{{ hostname }}", &alert).unwrap_err();
        assert!(matches!(err, SenderError::TemplatingError(_)));
    }
}
