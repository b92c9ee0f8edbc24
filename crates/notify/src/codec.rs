// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push channel wire format.
//!
//! Server frames share the envelope `{"type": ..., "data": {...}}`; client
//! commands are flat objects tagged by `type`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Notification, NotificationId};

/// Commands the client sends over the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "mark_as_read")]
    MarkRead { notification_id: NotificationId },
    #[serde(rename = "mark_all_read")]
    MarkAllRead,
    #[serde(rename = "mark_as_hidden")]
    MarkHidden { notification_id: NotificationId },
    #[serde(rename = "mark_all_hidden")]
    MarkAllHidden,
}

/// Events decoded from server frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NotificationCreated(Notification),
    NotificationUpdated(Notification),
    NotificationDeleted(NotificationId),
    ServerError(String),
}

/// Why an inbound frame could not be turned into a [`ServerEvent`].
///
/// None of these are fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    InvalidJson(String),
    UnknownType(String),
    UnknownNotificationKind(String),
    InvalidPayload(String),
}

impl DecodeError {
    /// Frames from a newer server that this client does not understand yet.
    pub fn is_unrecognized(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::UnknownNotificationKind(_))
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "invalid JSON frame: {e}"),
            Self::UnknownType(t) => write!(f, "unknown frame type: {t}"),
            Self::UnknownNotificationKind(k) => write!(f, "unknown notification kind: {k}"),
            Self::InvalidPayload(e) => write!(f, "invalid frame payload: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode a command as a text frame.
pub fn encode(command: &ClientCommand) -> String {
    // Serializing these variants cannot fail.
    serde_json::to_string(command).unwrap_or_default()
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct NotificationFrame {
    id: NotificationId,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorFrame {
    message: String,
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<ServerEvent, DecodeError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    match envelope.kind.as_str() {
        "notification" => decode_notification(envelope.data),
        "error" => {
            let frame: ErrorFrame = payload(envelope.data)?;
            Ok(ServerEvent::ServerError(frame.message))
        }
        other => Err(DecodeError::UnknownType(other.to_owned())),
    }
}

fn decode_notification(data: serde_json::Value) -> Result<ServerEvent, DecodeError> {
    let frame: NotificationFrame = payload(data)?;
    match frame.kind.as_str() {
        "NEW" => Ok(ServerEvent::NotificationCreated(notification_body(frame.id, frame.data)?)),
        "UPDATE" => Ok(ServerEvent::NotificationUpdated(notification_body(frame.id, frame.data)?)),
        "DELETE" => Ok(ServerEvent::NotificationDeleted(frame.id)),
        other => Err(DecodeError::UnknownNotificationKind(other.to_owned())),
    }
}

/// The nested body normally repeats the frame id; fill it in when it does not.
fn notification_body(
    id: NotificationId,
    mut body: serde_json::Value,
) -> Result<Notification, DecodeError> {
    if let Some(obj) = body.as_object_mut() {
        obj.entry("id").or_insert_with(|| serde_json::Value::from(id));
    }
    payload(body)
}

fn payload<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidPayload(e.to_string()))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
