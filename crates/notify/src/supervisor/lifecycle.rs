// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle state machine, free of I/O so every transition can be
//! driven directly in tests.

use std::time::Duration;

use serde::Serialize;

use super::backoff::ReconnectPolicy;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Open,
    Closed,
    Reconnecting {
        attempt: u32,
    },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// A transport exists or is scheduled.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Reconnecting { .. })
    }
}

/// What happens after the transport closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Wait `delay`, then open attempt number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Clean close, lost credential, or nothing was connected.
    Stopped,
    /// Attempts used up. Only an explicit connect restarts the machine.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: ConnectionState,
    attempts: u32,
    exhausted: bool,
    policy: ReconnectPolicy,
}

impl Lifecycle {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { state: ConnectionState::Idle, attempts: 0, exhausted: false, policy }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The last run gave up after using every reconnect attempt.
    pub fn exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Explicit connect. Returns false (no transition) while a transport is in
    /// flight or without a credential.
    pub fn begin_connect(&mut self, authenticated: bool) -> bool {
        if self.state.is_in_flight() || !authenticated {
            return false;
        }
        self.attempts = 0;
        self.exhausted = false;
        self.state = ConnectionState::Connecting;
        true
    }

    pub fn opened(&mut self) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }
        self.attempts = 0;
        self.state = ConnectionState::Open;
        true
    }

    pub fn closed(&mut self, clean: bool, authenticated: bool) -> CloseOutcome {
        if !matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            return CloseOutcome::Stopped;
        }
        if clean || !authenticated {
            self.state = ConnectionState::Closed;
            return CloseOutcome::Stopped;
        }
        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::Closed;
            self.exhausted = true;
            return CloseOutcome::Exhausted;
        }
        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        self.state = ConnectionState::Reconnecting { attempt: self.attempts };
        CloseOutcome::Retry { attempt: self.attempts, delay }
    }

    /// The backoff timer fired.
    pub fn retry_elapsed(&mut self) -> bool {
        if !matches!(self.state, ConnectionState::Reconnecting { .. }) {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    pub fn disconnect(&mut self) {
        self.attempts = 0;
        self.exhausted = false;
        self.state = ConnectionState::Closed;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
