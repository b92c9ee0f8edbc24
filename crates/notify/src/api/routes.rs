// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::Url;

use crate::model::NotificationId;

/// URL builder for the devsync REST endpoints and the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// API base, always ending in `/`.
    base: String,
}

impl Routes {
    pub fn new(api_url: &str) -> Self {
        let mut base = api_url.trim_end_matches('/').to_owned();
        base.push('/');
        Self { base }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn notifications(&self) -> String {
        format!("{}api/v1/notifications/", self.base)
    }

    pub fn notification(&self, id: NotificationId) -> String {
        format!("{}api/v1/notifications/{id}/", self.base)
    }

    pub fn invitations(&self) -> String {
        format!("{}api/v1/invitations/", self.base)
    }

    pub fn accept_invitation(&self, invitation_id: i64) -> String {
        format!("{}api/v1/invitations/{invitation_id}/accept/", self.base)
    }

    pub fn reject_invitation(&self, invitation_id: i64) -> String {
        format!("{}api/v1/invitations/{invitation_id}/reject/", self.base)
    }

    /// Push channel URL (no token), derived by swapping the HTTP scheme for
    /// its WebSocket counterpart.
    pub fn push_channel(&self) -> String {
        let ws_base = if self.base.starts_with("https://") {
            self.base.replacen("https://", "wss://", 1)
        } else {
            self.base.replacen("http://", "ws://", 1)
        };
        format!("{ws_base}ws/notifications/")
    }

    /// Resolve an action URL. Absolute URLs pass through; paths are joined
    /// against the API origin.
    pub fn resolve(&self, url: &str) -> Option<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Some(url.to_owned());
        }
        let base = Url::parse(&self.base).ok()?;
        base.join(url).ok().map(String::from)
    }
}
