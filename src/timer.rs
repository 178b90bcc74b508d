//! Retransmit timer for the single in-flight datagram.
//!
//! Stop-and-wait needs only one timer: it is armed on every send and fires
//! when no matching ACK arrives within the attempt timeout.  The timeout is
//! fixed (no RTT estimation, no back-off) and applies per attempt, never to
//! the transfer as a whole.
//!
//! [`RetransmitTimer`] also enforces the retry cap: once a datagram has been
//! resent `max_retries` times without an ACK the next expiry is fatal.

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of a timer expiry or stale ACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Resend the datagram; carries the retransmission ordinal (1-based).
    Resend(u32),
    /// The cap is spent; carries the total transmissions made.
    GiveUp(u32),
}

/// Per-datagram retransmit timer.
#[derive(Debug)]
pub struct RetransmitTimer {
    timeout: Duration,
    max_retries: u32,
    retries: u32,
    deadline: Instant,
}

impl RetransmitTimer {
    /// Arm a timer for a datagram that has just been sent.
    pub fn start(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            retries: 0,
            deadline: Instant::now() + timeout,
        }
    }

    /// Instant at which the current attempt expires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Retransmissions made so far for this datagram.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Decide whether to resend after an expiry or a mismatched ACK.
    ///
    /// On [`RetryDecision::Resend`] the caller must resend and then call
    /// [`RetransmitTimer::rearm`].
    pub fn on_expiry(&mut self) -> RetryDecision {
        if self.retries >= self.max_retries {
            return RetryDecision::GiveUp(self.retries + 1);
        }
        self.retries += 1;
        RetryDecision::Resend(self.retries)
    }

    /// Restart the attempt window after a (re)send.
    pub fn rearm(&mut self) {
        self.deadline = Instant::now() + self.timeout;
    }
}
