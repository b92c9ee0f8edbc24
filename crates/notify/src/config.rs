// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::api::Routes;
use crate::model::NotificationId;
use crate::supervisor::ReconnectPolicy;

/// Console client for devsync notifications.
#[derive(Debug, Parser)]
#[command(name = "devsync-notify", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub config: NotifyConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Stay connected and print every notification update until Ctrl-C.
    Watch,
    /// Fetch and print the current notification snapshot over REST.
    List,
    /// Report whether the push channel can be opened.
    Status,
    /// Mark one notification as read.
    MarkRead { id: NotificationId },
    /// Mark every notification as read.
    MarkAllRead,
    /// Hide one notification.
    Hide { id: NotificationId },
    /// Hide every notification.
    HideAll,
}

/// Connection, reconnect and logging settings.
#[derive(Debug, Clone, clap::Args)]
pub struct NotifyConfig {
    /// Base URL of the devsync REST API.
    #[arg(long, default_value = "https://dev-sync.ru/", env = "DEVSYNC_API_URL")]
    pub api_url: String,

    /// Push channel URL. Derived from the API URL when unset.
    #[arg(long, env = "DEVSYNC_WS_URL")]
    pub ws_url: Option<String>,

    /// Auth token for both the REST API and the push channel.
    #[arg(long, env = "DEVSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Reconnect attempts after an unclean close before giving up.
    #[arg(long, default_value_t = 5, env = "DEVSYNC_MAX_RECONNECT_ATTEMPTS")]
    pub max_reconnect_attempts: u32,

    /// First reconnect delay in milliseconds; doubles on each attempt.
    #[arg(long, default_value_t = 1000, env = "DEVSYNC_RECONNECT_BASE_MS")]
    pub reconnect_base_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    #[arg(long, default_value_t = 30000, env = "DEVSYNC_RECONNECT_CAP_MS")]
    pub reconnect_cap_ms: u64,

    /// REST request timeout in milliseconds.
    #[arg(long, default_value_t = 10000, env = "DEVSYNC_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "DEVSYNC_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "DEVSYNC_LOG_LEVEL")]
    pub log_level: String,
}

impl NotifyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !has_scheme(&self.api_url, &["http://", "https://"]) {
            anyhow::bail!("--api-url must start with http:// or https://: {}", self.api_url);
        }
        if let Some(ref ws_url) = self.ws_url {
            if !has_scheme(ws_url, &["ws://", "wss://"]) {
                anyhow::bail!("--ws-url must start with ws:// or wss://: {ws_url}");
            }
        }
        if self.reconnect_base_ms == 0 {
            anyhow::bail!("--reconnect-base-ms must be greater than zero");
        }
        if self.reconnect_cap_ms < self.reconnect_base_ms {
            anyhow::bail!(
                "--reconnect-cap-ms ({}) must not be below --reconnect-base-ms ({})",
                self.reconnect_cap_ms,
                self.reconnect_base_ms
            );
        }
        Ok(())
    }

    pub fn routes(&self) -> Routes {
        Routes::new(&self.api_url)
    }

    /// Push channel URL without the token query parameter.
    pub fn push_url(&self) -> String {
        match self.ws_url {
            Some(ref url) => url.clone(),
            None => self.routes().push_channel(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            base: Duration::from_millis(self.reconnect_base_ms),
            cap: Duration::from_millis(self.reconnect_cap_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    schemes.iter().any(|s| url.starts_with(s))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
