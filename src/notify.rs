//! Chat webhook alerts

use anyhow::{Context, Result};
use reconcile::AlertSink;
use serde::Serialize;

#[derive(Serialize)]
struct WebhookBody<'a> {
    text: &'a str,
}

/// Posts alerts to a Slack-compatible incoming webhook
///
/// With no hook configured, alerts are only logged.
pub struct SlackNotifier {
    agent: ureq::Agent,
    hook: String,
    environment: String,
}

impl SlackNotifier {
    pub fn new(hook: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            hook: hook.into(),
            environment: String::new(),
        }
    }

    /// Tag every alert with the environment it came from
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    fn alert_text(&self, message: &str) -> String {
        let environment = self.environment.trim();
        if environment.is_empty() {
            format!(":bangbang: {message}")
        } else {
            format!(":bangbang: [{environment}] {message}")
        }
    }

    /// Whether messages leave the process
    pub fn is_enabled(&self) -> bool {
        !self.hook.trim().is_empty()
    }

    /// Send one message
    pub fn notify(&self, message: &str) -> Result<()> {
        if !self.is_enabled() {
            log::info!("{message}");
            return Ok(());
        }

        let body = self
            .agent
            .post(&self.hook)
            .header("Content-Type", "application/json")
            .send_json(WebhookBody { text: message })
            .context("Failed to reach webhook")?
            .body_mut()
            .read_to_string()
            .context("Failed to read webhook response")?;

        check_response(&body)
    }
}

impl AlertSink for SlackNotifier {
    fn alert(&self, message: &str) -> Result<()> {
        log::warn!("{message}");
        self.notify(&self.alert_text(message))
    }
}

fn check_response(body: &str) -> Result<()> {
    if body.trim() != "ok" {
        anyhow::bail!("Webhook rejected notification: {}", body.trim());
    }
    Ok(())
}
