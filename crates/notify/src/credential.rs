// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential accessor consumed by the push channel and the REST client.

use parking_lot::RwLock;

/// Source of the auth token for the current user.
///
/// Read at every connection attempt, so a token refreshed or cleared between
/// reconnects takes effect on the next attempt.
pub trait Credentials: Send + Sync {
    fn token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }
}

/// In-memory token holder. Login sets it, logout clears it.
#[derive(Debug, Default)]
pub struct TokenCredentials {
    token: RwLock<Option<String>>,
}

impl TokenCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self { token: RwLock::new(token) }
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl Credentials for TokenCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }
}
