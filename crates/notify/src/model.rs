// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification data model shared by the REST snapshot and the push channel.
//!
//! Field names follow the backend wire format (`actions_data`, `type`,
//! `payload`); Rust-side names describe what the fields mean.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::Routes;

pub type NotificationId = i64;

/// Parse an ISO 8601 timestamp. Values without an offset, as the backend
/// emits when time zone support is off, are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

/// Where a notification in the merged set came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Pushed or fetched from the notifications endpoint.
    #[default]
    Server,
    /// Synthesized client-side from the pending invitation with this id.
    Invitation(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(rename = "actions_data", default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub footnote: Option<String>,
    #[serde(skip)]
    pub origin: Origin,
}

impl Notification {
    pub fn is_synthesized(&self) -> bool {
        matches!(self.origin, Origin::Invitation(_))
    }
}

/// A button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub style: ActionStyle,
    #[serde(rename = "payload", default)]
    pub target: ActionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Performs a network call, then updates the notification locally.
    Request,
    /// Pure navigation.
    Anchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    Primary,
    Secondary,
    Danger,
}

impl ActionStyle {
    /// Primary actions accept; the other styles decline.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    /// Absolute URL or a path relative to the API origin. Absent for
    /// actions the backend could not resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
}

impl ActionTarget {
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self { url: Some(url.into()), method: Some(method) }
    }

    pub fn method(&self) -> HttpMethod {
        self.method.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

// -- Invitations --------------------------------------------------------------

/// A pending invitation for the current user to join a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: i64,
    pub project: InvitedProject,
    #[serde(default)]
    pub invited_by: Option<i64>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitedProject {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub owner: ProjectOwner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectOwner {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

pub const INVITATION_TITLE: &str = "Invitation to project";

/// Notification id for a synthesized invitation.
///
/// Invitation ids share no sequence with notification ids, so synthesized
/// entries use the negated invitation id to stay disjoint from server ids.
pub fn synthesized_id(invitation_id: i64) -> NotificationId {
    -invitation_id
}

impl Invitation {
    /// Present this invitation as an unread notification with accept and
    /// decline actions wired to the invitation endpoints.
    pub fn to_notification(&self, routes: &Routes) -> Notification {
        let owner = &self.project.owner;
        let footnote = format!("From {} {}", owner.first_name, owner.last_name);
        Notification {
            id: synthesized_id(self.id),
            title: INVITATION_TITLE.to_owned(),
            message: format!("You have been invited to the project \"{}\"", self.project.title),
            created_at: self.date_created,
            is_read: false,
            actions: vec![
                Action {
                    text: "Accept".to_owned(),
                    kind: ActionKind::Request,
                    style: ActionStyle::Primary,
                    target: ActionTarget::new(routes.accept_invitation(self.id), HttpMethod::Post),
                },
                Action {
                    text: "Decline".to_owned(),
                    kind: ActionKind::Request,
                    style: ActionStyle::Secondary,
                    target: ActionTarget::new(routes.reject_invitation(self.id), HttpMethod::Post),
                },
            ],
            footnote: Some(footnote.trim_end().to_owned()),
            origin: Origin::Invitation(self.id),
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
