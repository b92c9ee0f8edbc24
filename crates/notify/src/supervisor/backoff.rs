// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Reconnect schedule: `min(base * 2^attempt, cap)`, at most `max_attempts`
/// retries after an unclean close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base: Duration::from_millis(1000), cap: Duration::from_millis(30000) }
    }
}

impl ReconnectPolicy {
    /// Constant delay between attempts (base == cap).
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self { max_attempts, base: delay, cap: delay }
    }

    /// Delay before the retry that follows `attempt` previous retries.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}
