pub mod senders;

use std::fmt;

use tracing::{info, warn};

use shipshape_common::alert::Alert;

use crate::config::Channels;

use self::senders::email::EmailSender;
use self::senders::slack::SlackSender;
use self::senders::sms::SmsSender;
use self::senders::teams::TeamsSender;
use self::senders::ChannelSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Email,
    Slack,
    Teams,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
            ChannelKind::Teams => "teams",
            ChannelKind::Sms => "sms",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened on one channel for one alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Sent,
    Simulated,
    Skipped,
    Failed(String),
}

/// Per-channel outcome of dispatching one alert. Every channel appears,
/// configured or not.
#[derive(Debug)]
pub struct DispatchReport {
    pub results: Vec<(ChannelKind, ChannelStatus)>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, status)| *status == ChannelStatus::Sent)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, status)| matches!(status, ChannelStatus::Failed(_)))
            .count()
    }

    pub fn lines(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|(kind, status)| match status {
                ChannelStatus::Sent => format!("{kind}: sent"),
                ChannelStatus::Simulated => format!("{kind}: simulated"),
                ChannelStatus::Skipped => format!("{kind}: skipped (not configured)"),
                ChannelStatus::Failed(reason) => format!("{kind}: failed ({reason})"),
            })
            .collect()
    }
}

/// Fans one alert out to every configured channel. A failure on one
/// channel never blocks the rest, and nothing is retried.
pub struct AlertDispatcher {
    email: Option<EmailSender>,
    slack: Option<SlackSender>,
    teams: Option<TeamsSender>,
    sms: Option<SmsSender>,
    simulate: bool,
}

impl AlertDispatcher {
    pub fn from_config(channels: &Channels, simulate: bool) -> Self {
        Self {
            email: channels.email.clone().map(EmailSender::new),
            slack: channels.slack.clone().map(SlackSender::new),
            teams: channels.teams.clone().map(TeamsSender::new),
            sms: channels.sms.clone().map(SmsSender::new),
            simulate,
        }
    }

    pub async fn dispatch(&self, alert: &Alert) -> DispatchReport {
        let mut results = Vec::with_capacity(4);
        results.push((
            ChannelKind::Email,
            self.attempt(ChannelKind::Email, self.email.as_ref(), alert).await,
        ));
        results.push((
            ChannelKind::Slack,
            self.attempt(ChannelKind::Slack, self.slack.as_ref(), alert).await,
        ));
        results.push((
            ChannelKind::Teams,
            self.attempt(ChannelKind::Teams, self.teams.as_ref(), alert).await,
        ));
        results.push((
            ChannelKind::Sms,
            self.attempt(ChannelKind::Sms, self.sms.as_ref(), alert).await,
        ));
        DispatchReport { results }
    }

    async fn attempt<S: ChannelSender + Sync>(
        &self,
        kind: ChannelKind,
        sender: Option<&S>,
        alert: &Alert,
    ) -> ChannelStatus {
        let Some(sender) = sender else {
            return ChannelStatus::Skipped;
        };
        if self.simulate {
            info!(channel = kind.as_str(), subject = %alert.subject, "simulate: would send alert");
            return ChannelStatus::Simulated;
        }
        match sender.send(alert).await {
            Ok(()) => {
                info!(channel = kind.as_str(), subject = %alert.subject, "alert sent");
                ChannelStatus::Sent
            }
            Err(e) => {
                warn!(channel = kind.as_str(), error = %e, "failed to send alert");
                ChannelStatus::Failed(e.to_string())
            }
        }
    }
}
