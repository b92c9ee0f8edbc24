// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console subcommands: watch the push channel, list the snapshot, and send
//! one-off read/hide commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::codec::ClientCommand;
use crate::config::NotifyConfig;
use crate::credential::{Credentials, TokenCredentials};
use crate::model::Notification;
use crate::session::{NotificationSession, SessionUpdate};
use crate::store::NotificationStore;
use crate::supervisor::{ConnectionState, ConnectionStatus, ConnectionSupervisor};

/// How long one-shot commands wait for the push channel to open.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

fn credentials(config: &NotifyConfig) -> Arc<dyn Credentials> {
    Arc::new(TokenCredentials::new(config.token.clone()))
}

fn require_token(config: &NotifyConfig) -> anyhow::Result<()> {
    match config.token.as_deref() {
        Some(t) if !t.is_empty() => Ok(()),
        _ => anyhow::bail!("no token: pass --token or set DEVSYNC_TOKEN"),
    }
}

#[derive(Serialize)]
struct WatchLine<'a> {
    #[serde(flatten)]
    update: &'a SessionUpdate,
    unread: usize,
}

/// Stay connected and print one JSON line per update until Ctrl-C.
pub async fn watch(config: &NotifyConfig) -> anyhow::Result<()> {
    require_token(config)?;
    let mut session = NotificationSession::start(config, credentials(config));

    match session.refresh().await {
        Ok(count) => info!(count, "initial snapshot loaded"),
        // Push updates still arrive; the list just starts empty.
        Err(e) => warn!(err = %e, "initial snapshot failed, continuing with push only"),
    }
    print_table(session.store().visible());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = session.next_update() => {
                let Some(update) = update else { break };
                let line = WatchLine { update: &update, unread: session.store().unread_count() };
                println!("{}", serde_json::to_string(&line)?);

                if matches!(update, SessionUpdate::Lagged { .. }) {
                    if let Err(e) = session.refresh().await {
                        warn!(err = %e, "refresh after lag failed");
                    }
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

/// Fetch and print the merged snapshot over REST.
pub async fn list(config: &NotifyConfig) -> anyhow::Result<()> {
    let api = ApiClient::new(config.routes(), credentials(config), config.request_timeout());
    let snapshot = api.fetch_snapshot().await.context("fetching notifications")?;

    let mut store = NotificationStore::new();
    store.load_snapshot(snapshot, api.routes());
    print_table(store.visible());
    println!("\n{} notification(s), {} unread", store.len(), store.unread_count());
    Ok(())
}

#[derive(Serialize)]
struct StatusLine {
    status: ConnectionStatus,
    #[serde(flatten)]
    state: ConnectionState,
}

/// Try to open the push channel and report the result.
pub async fn status(config: &NotifyConfig) -> anyhow::Result<()> {
    require_token(config)?;
    let supervisor = connect(config);
    supervisor.wait_open(OPEN_TIMEOUT).await;

    let line = StatusLine { status: supervisor.status(), state: supervisor.state() };
    println!("{}", serde_json::to_string(&line)?);
    supervisor.close(None).await;
    Ok(())
}

/// Open the push channel, send one command, and close.
pub async fn send_one(config: &NotifyConfig, command: ClientCommand) -> anyhow::Result<()> {
    require_token(config)?;
    let supervisor = connect(config);
    if !supervisor.wait_open(OPEN_TIMEOUT).await {
        supervisor.disconnect(None);
        anyhow::bail!("push channel did not open within {}s", OPEN_TIMEOUT.as_secs());
    }
    if !supervisor.send(&command) {
        anyhow::bail!("push channel closed before the command was sent");
    }
    supervisor.close(None).await;
    info!(?command, "command sent");
    Ok(())
}

fn connect(config: &NotifyConfig) -> ConnectionSupervisor {
    let supervisor =
        ConnectionSupervisor::new(config.push_url(), credentials(config), config.reconnect_policy());
    supervisor.connect();
    supervisor
}

fn print_table<'a>(notifications: impl Iterator<Item = &'a Notification>) {
    println!("{:<8} {:<6} {:<20} {}", "ID", "READ", "CREATED", "TITLE");
    println!("{}", "-".repeat(72));
    for n in notifications {
        let read = if n.is_read { "yes" } else { "no" };
        let created = n.created_at.format("%Y-%m-%d %H:%M");
        println!("{:<8} {:<6} {:<20} {}", n.id, read, created.to_string(), n.title);
    }
}
