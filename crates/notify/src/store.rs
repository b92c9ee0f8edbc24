// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory set of notifications visible to the current user.
//!
//! Entries are unique by id and kept sorted newest first (`created_at`
//! descending, then id descending). Every mutation is idempotent per id, so
//! the REST snapshot, push deltas and optimistic local edits can arrive in
//! any order without duplicating or corrupting entries.

use std::cmp::Ordering;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::api::{Routes, Snapshot};
use crate::codec::ServerEvent;
use crate::model::{Notification, NotificationId, Origin};

/// Display order: newest first, ties broken by id descending.
pub fn display_order(a: &Notification, b: &Notification) -> Ordering {
    b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
}

#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    entries: IndexMap<NotificationId, Notification>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with server notifications plus one synthesized
    /// notification per pending invitation.
    pub fn load_snapshot(&mut self, snapshot: Snapshot, routes: &Routes) {
        let Snapshot { notifications, invitations } = snapshot;
        let mut merged: Vec<Notification> = notifications
            .into_iter()
            .map(|mut n| {
                n.origin = Origin::Server;
                n
            })
            .chain(invitations.iter().map(|inv| inv.to_notification(routes)))
            .collect();
        merged.sort_by(display_order);

        let mut entries = IndexMap::with_capacity(merged.len());
        for n in merged {
            if entries.contains_key(&n.id) {
                warn!(notification_id = n.id, "duplicate id in snapshot, keeping newest");
                continue;
            }
            entries.insert(n.id, n);
        }
        debug!(count = entries.len(), "notification snapshot loaded");
        self.entries = entries;
    }

    /// Insert in sort position. A second push for the same id replaces the
    /// first.
    pub fn apply_created(&mut self, notification: Notification) {
        self.entries.shift_remove(&notification.id);
        let at = self.entries.partition_point(|_, e| display_order(e, &notification).is_lt());
        self.entries.shift_insert(at, notification.id, notification);
    }

    /// Replace an existing entry. Returns false (and changes nothing) when the
    /// id is absent.
    pub fn apply_updated(&mut self, notification: Notification) -> bool {
        let Some(current) = self.entries.get_mut(&notification.id) else {
            warn!(notification_id = notification.id, "update for unknown notification ignored");
            return false;
        };
        if current.created_at == notification.created_at {
            *current = notification;
        } else {
            self.apply_created(notification);
        }
        true
    }

    /// Remove an entry. Absent ids are a no-op.
    pub fn apply_deleted(&mut self, id: NotificationId) -> Option<Notification> {
        self.entries.shift_remove(&id)
    }

    /// Apply one decoded push event. Returns whether the set changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::NotificationCreated(n) => {
                self.apply_created(n.clone());
                true
            }
            ServerEvent::NotificationUpdated(n) => self.apply_updated(n.clone()),
            ServerEvent::NotificationDeleted(id) => self.apply_deleted(*id).is_some(),
            ServerEvent::ServerError(_) => false,
        }
    }

    /// Returns whether the entry went from unread to read.
    pub fn mark_read_locally(&mut self, id: NotificationId) -> bool {
        match self.entries.get_mut(&id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns how many entries went from unread to read.
    pub fn mark_all_read_locally(&mut self) -> usize {
        let mut changed = 0;
        for n in self.entries.values_mut().filter(|n| !n.is_read) {
            n.is_read = true;
            changed += 1;
        }
        changed
    }

    /// Hidden notifications are not retained.
    pub fn mark_hidden_locally(&mut self, id: NotificationId) -> Option<Notification> {
        self.entries.shift_remove(&id)
    }

    pub fn hide_all_locally(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Visible notifications in display order.
    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<NotificationId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|n| !n.is_read).count()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
