//! Operator notifications.
//!
//! Signals go out as a single Discord webhook message: a bold title line
//! followed by one line per decision. A missing webhook is logged and the
//! message dropped; the service keeps running.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::types::Decision;

/// Discord rejects messages longer than this.
pub const DISCORD_MAX_CHARS: usize = 2000;

/// Sink for operator-facing messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a titled block of lines.
    async fn push(&self, title: &str, lines: &[String]) -> Result<()>;
}

/// One line per decision, as shown in the alert.
pub fn render_decision(d: &Decision) -> String {
    format!(
        "{}  {}  Pick: **{}**  Odds: {}  True: {:.2}  Edge: {:.1}%  Kelly: {:.1}%  Stake: ${:.2}  Risk: {}  (KO {})",
        d.event,
        d.market,
        d.pick_label(),
        d.odds,
        d.win_probability,
        d.ev * 100.0,
        d.kelly_fraction.max(0.0) * 100.0,
        d.stake,
        d.risk,
        d.commence_time.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

/// Message body: `**title**` then the lines, cut to Discord's limit.
pub fn format_message(title: &str, lines: &[String]) -> String {
    let mut content = format!("**{title}**");
    for line in lines {
        content.push('\n');
        content.push_str(line);
    }
    if content.chars().count() > DISCORD_MAX_CHARS {
        content = content.chars().take(DISCORD_MAX_CHARS - 1).collect();
        content.push('…');
    }
    content
}

#[derive(Serialize)]
struct DiscordMessage<'a> {
    content: &'a str,
}

/// Discord webhook notifier.
pub struct DiscordNotifier {
    http: Client,
    webhook_url: Option<SecretString>,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<SecretString>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, webhook_url })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn push(&self, title: &str, lines: &[String]) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            error!("DISCORD_WEBHOOK_URL is not set; skipping notification");
            return Ok(());
        };

        let content = format_message(title, lines);
        let resp = self
            .http
            .post(url.expose_secret().as_str())
            .json(&DiscordMessage { content: &content })
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Discord request failed: {}", e.without_url()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook error {status}: {body}");
        }

        debug!(lines = lines.len(), "Discord notification sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
