//! Invitation Backoff
//!
//! Discovery re-announces peers at the transport's own cadence, and each announcement
//! of a reconnect-flagged peer would otherwise issue another invitation. The backoff
//! spaces invitations to one peer exponentially and optionally caps their number.

use crate::config::BackoffConfig;
use crate::types::Timestamp;
use core::time::Duration;

/// Outcome of asking whether an invitation may be sent now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteDecision {
    /// Send the invitation
    Proceed,
    /// Too soon; try again after the delay
    Defer(Duration),
    /// Attempt budget spent
    Exhausted,
}

/// Per-peer exponential invitation backoff
#[derive(Debug, Clone)]
pub struct InviteBackoff {
    config: BackoffConfig,
    current_delay: Duration,
    attempt_count: u32,
    next_allowed: Option<Timestamp>,
}

impl InviteBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let current_delay = config.initial_delay;
        Self {
            config,
            current_delay,
            attempt_count: 0,
            next_allowed: None,
        }
    }

    /// Decide on an invitation at `now`, recording it if it may proceed
    pub fn check(&mut self, now: Timestamp) -> InviteDecision {
        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempt_count >= max_attempts {
                return InviteDecision::Exhausted;
            }
        }

        if let Some(next_allowed) = self.next_allowed {
            if now < next_allowed {
                return InviteDecision::Defer(next_allowed - now);
            }
        }

        self.attempt_count += 1;
        self.next_allowed = Some(now + self.current_delay);

        let next_delay_millis =
            (self.current_delay.as_millis() as f32 * self.config.backoff_multiplier) as u64;
        self.current_delay = Duration::from_millis(
            next_delay_millis.min(self.config.max_delay.as_millis() as u64),
        );

        InviteDecision::Proceed
    }

    /// Reset the backoff state (call on successful connection)
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
        self.next_allowed = None;
    }

    /// Invitations issued since the last reset
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}
