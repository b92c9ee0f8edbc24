// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One authenticated session: a push channel, its store, and the REST client,
//! created on login and torn down on logout.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Snapshot};
use crate::codec::ServerEvent;
use crate::config::NotifyConfig;
use crate::credential::Credentials;
use crate::dispatch::CommandDispatcher;
use crate::error::ApiError;
use crate::model::{Notification, NotificationId};
use crate::store::NotificationStore;
use crate::supervisor::{ConnectionState, ConnectionStatus, ConnectionSupervisor, SupervisorEvent};

/// A change the session applied, or a status transition worth showing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionUpdate {
    Connected,
    Disconnected { clean: bool },
    Created { notification: Notification },
    Updated { notification: Notification },
    Deleted { id: NotificationId },
    ServerError { message: String },
    TransportError { message: String },
    DecodeFailed { message: String },
    ReconnectFailed,
    /// Events were dropped because the session fell behind; refresh to
    /// reconcile.
    Lagged { skipped: u64 },
}

pub struct NotificationSession {
    supervisor: ConnectionSupervisor,
    api: ApiClient,
    store: NotificationStore,
    events: broadcast::Receiver<SupervisorEvent>,
    last_error: Option<String>,
}

impl NotificationSession {
    /// Build the session and start connecting. Must run inside a tokio
    /// runtime. Without a credential the channel stays idle and the session
    /// works from REST alone.
    pub fn start(config: &NotifyConfig, credentials: Arc<dyn Credentials>) -> Self {
        let supervisor = ConnectionSupervisor::new(
            config.push_url(),
            Arc::clone(&credentials),
            config.reconnect_policy(),
        );
        let api = ApiClient::new(config.routes(), credentials, config.request_timeout());
        Self::with_parts(supervisor, api)
    }

    /// Assemble a session from prebuilt parts and start connecting.
    pub fn with_parts(supervisor: ConnectionSupervisor, api: ApiClient) -> Self {
        // Subscribe first so the open event is not missed.
        let events = supervisor.subscribe();
        supervisor.connect();
        Self { supervisor, api, store: NotificationStore::new(), events, last_error: None }
    }

    /// Reload the snapshot over REST. On failure the current set is kept.
    pub async fn refresh(&mut self) -> Result<usize, ApiError> {
        let snapshot: Snapshot = self.api.fetch_snapshot().await.inspect_err(|e| {
            warn!(err = %e, "snapshot refresh failed");
        })?;
        self.store.load_snapshot(snapshot, self.api.routes());
        info!(count = self.store.len(), unread = self.store.unread_count(), "notifications refreshed");
        Ok(self.store.len())
    }

    /// Wait for the next push channel event, apply it to the store, and
    /// report what changed. Events that change nothing are skipped.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let event = match self.events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session lagged behind the push channel");
                    return Some(SessionUpdate::Lagged { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    fn apply(&mut self, event: SupervisorEvent) -> Option<SessionUpdate> {
        let update = match event {
            SupervisorEvent::Opened => SessionUpdate::Connected,
            SupervisorEvent::Closed { clean } => SessionUpdate::Disconnected { clean },
            SupervisorEvent::ReconnectFailed => {
                self.last_error = Some("reconnection failed".to_owned());
                SessionUpdate::ReconnectFailed
            }
            SupervisorEvent::TransportError(message) => {
                self.last_error = Some(message.clone());
                SessionUpdate::TransportError { message }
            }
            SupervisorEvent::DecodeFailed(message) => SessionUpdate::DecodeFailed { message },
            SupervisorEvent::Event(ServerEvent::NotificationCreated(notification)) => {
                self.store.apply_created(notification.clone());
                SessionUpdate::Created { notification }
            }
            SupervisorEvent::Event(ServerEvent::NotificationUpdated(notification)) => {
                if !self.store.apply_updated(notification.clone()) {
                    return None;
                }
                SessionUpdate::Updated { notification }
            }
            SupervisorEvent::Event(ServerEvent::NotificationDeleted(id)) => {
                if self.store.apply_deleted(id).is_none() {
                    debug!(notification_id = id, "delete for unknown notification");
                    return None;
                }
                SessionUpdate::Deleted { id }
            }
            SupervisorEvent::Event(ServerEvent::ServerError(message)) => {
                warn!(%message, "server reported an error");
                self.last_error = Some(message.clone());
                SessionUpdate::ServerError { message }
            }
        };
        Some(update)
    }

    pub fn store(&self) -> &NotificationStore {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    /// Intents against this session's store and channel.
    pub fn dispatcher(&mut self) -> CommandDispatcher<'_> {
        CommandDispatcher::new(&mut self.store, &self.supervisor, &self.api)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.supervisor.status()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.watch_state()
    }

    /// Most recent transport or server error, for display next to the status.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Restart the push channel, for example after reconnect attempts ran out.
    pub fn reconnect(&mut self) {
        self.last_error = None;
        self.supervisor.connect();
    }

    /// Close the channel first, then release everything else.
    pub async fn shutdown(self) {
        self.supervisor.close(Some("session closed")).await;
    }
}

impl Drop for NotificationSession {
    fn drop(&mut self) {
        self.supervisor.disconnect(Some("session closed"));
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
