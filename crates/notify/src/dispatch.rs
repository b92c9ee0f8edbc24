// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User intents: apply the optimistic local change, then tell the server.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::codec::ClientCommand;
use crate::error::ApiError;
use crate::model::{Action, ActionKind, Notification, NotificationId};
use crate::store::NotificationStore;
use crate::supervisor::ConnectionSupervisor;

/// What happened to the outbound half of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Handed to the open push channel.
    Sent,
    /// Channel not open; the next snapshot load reconciles.
    Dropped,
    /// Synthesized notification the server does not know about.
    LocalOnly,
}

/// Result of running one of a notification's own actions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Anchor action: open this URL.
    Navigate(String),
    /// Primary request succeeded; the notification is now read.
    Accepted(serde_json::Value),
    /// Secondary or danger request succeeded; the notification is gone.
    Declined(serde_json::Value),
}

/// A notification action whose network call failed.
///
/// The optimistic change has already been applied. `previous` is the entry as
/// it was before, so the caller can put it back with
/// [`NotificationStore::apply_created`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActionError {
    pub error: ApiError,
    pub previous: Option<Notification>,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notification action failed: {}", self.error)
    }
}

impl std::error::Error for ActionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Borrows the session's store, supervisor and REST client for one intent.
pub struct CommandDispatcher<'a> {
    store: &'a mut NotificationStore,
    supervisor: &'a ConnectionSupervisor,
    api: &'a ApiClient,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(
        store: &'a mut NotificationStore,
        supervisor: &'a ConnectionSupervisor,
        api: &'a ApiClient,
    ) -> Self {
        Self { store, supervisor, api }
    }

    pub fn mark_as_read(&mut self, id: NotificationId) -> Delivery {
        let local_only = self.is_local_only(id);
        self.store.mark_read_locally(id);
        if local_only {
            return Delivery::LocalOnly;
        }
        self.send(ClientCommand::MarkRead { notification_id: id })
    }

    pub fn mark_all_as_read(&mut self) -> Delivery {
        let changed = self.store.mark_all_read_locally();
        debug!(changed, "marked all notifications read");
        self.send(ClientCommand::MarkAllRead)
    }

    pub fn mark_as_hidden(&mut self, id: NotificationId) -> Delivery {
        let local_only = self.is_local_only(id);
        self.store.mark_hidden_locally(id);
        if local_only {
            return Delivery::LocalOnly;
        }
        self.send(ClientCommand::MarkHidden { notification_id: id })
    }

    pub fn mark_all_as_hidden(&mut self) -> Delivery {
        let removed = self.store.hide_all_locally();
        debug!(removed, "hid all notifications");
        self.send(ClientCommand::MarkAllHidden)
    }

    /// Run one of the notification's actions.
    ///
    /// Anchors only resolve their URL. Requests call the target over REST and
    /// then, whatever the outcome, mark the notification read (primary) or
    /// remove it (secondary, danger). Failures are not rolled back here.
    pub async fn run_action(
        &mut self,
        id: NotificationId,
        action: &Action,
    ) -> Result<ActionOutcome, ActionError> {
        if action.kind == ActionKind::Anchor {
            let url = action
                .target
                .url
                .as_deref()
                .and_then(|raw| self.api.routes().resolve(raw))
                .ok_or_else(|| ActionError {
                    error: ApiError::invalid_target("anchor action has no usable url"),
                    previous: None,
                })?;
            return Ok(ActionOutcome::Navigate(url));
        }

        let previous = self.store.get(id).cloned();
        let result = self.api.execute(&action.target).await;

        let accept = action.style.is_accept();
        if accept {
            self.store.mark_read_locally(id);
        } else {
            self.store.apply_deleted(id);
        }

        match result {
            Ok(value) if accept => Ok(ActionOutcome::Accepted(value)),
            Ok(value) => Ok(ActionOutcome::Declined(value)),
            Err(error) => {
                warn!(notification_id = id, err = %error, "notification action failed");
                Err(ActionError { error, previous })
            }
        }
    }

    fn is_local_only(&self, id: NotificationId) -> bool {
        self.store.get(id).is_some_and(Notification::is_synthesized)
    }

    fn send(&self, command: ClientCommand) -> Delivery {
        if self.supervisor.send(&command) {
            Delivery::Sent
        } else {
            Delivery::Dropped
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
