// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Classification of a failed REST call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    BadRequest,
    Server,
    Transport,
    Decode,
    InvalidTarget,
}

impl ErrorKind {
    /// Map an HTTP status to an error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            400..=499 => Self::BadRequest,
            _ => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Server => "SERVER_ERROR",
            Self::Transport => "TRANSPORT",
            Self::Decode => "DECODE",
            Self::InvalidTarget => "INVALID_TARGET",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected REST operation, surfaced to the caller with status and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::from_status(status), status: Some(status), message: message.into() }
    }

    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self { kind: ErrorKind::InvalidTarget, status: None, message: message.into() }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status.as_u16(), e.to_string());
        }
        let kind = if e.is_decode() { ErrorKind::Decode } else { ErrorKind::Transport };
        Self { kind, status: None, message: e.to_string() }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self { kind: ErrorKind::Decode, status: None, message: e.to_string() }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
