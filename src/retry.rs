//! Exponential backoff for connection-level failures.
//!
//! Shared by the mailbox connect and the publish batch: after a failed
//! attempt `i` the caller waits `interval * 2^i` before the next attempt.
//! Exhausting the attempt budget is fatal; the worker must stop loudly
//! rather than keep running against a dead collaborator.

use std::time::Duration;

use tracing::error;

use crate::shutdown::Shutdown;

/// Maximum connect attempts against the IMAP server.
pub const MAILBOX_CONNECT_ATTEMPTS: u32 = 8;

/// Maximum attempts for one publish batch.
pub const PUBLISH_ATTEMPTS: u32 = 10;

/// Backoff schedule seeded by the configured polling interval.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Attempt budget; exhausting it is fatal.
    pub max_attempts: u32,
    /// Base wait; the wait after attempt `i` is `base * 2^i`.
    pub base: Duration,
}

impl BackoffPolicy {
    pub const fn new(max_attempts: u32, base: Duration) -> Self {
        Self { max_attempts, base }
    }

    /// Wait before the attempt following failed attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(31))
    }
}

/// Log and run the backoff wait after failed attempt `attempt`.
///
/// Returns `false` when shutdown was signaled during the wait; the caller
/// must stop retrying immediately.
pub async fn wait_before_retry(
    policy: &BackoffPolicy,
    attempt: u32,
    shutdown: &Shutdown,
) -> bool {
    let delay = policy.delay(attempt);
    error!(
        attempt = attempt + 1,
        max_attempts = policy.max_attempts,
        wait_secs = delay.as_secs(),
        "retry_waiting"
    );
    shutdown.sleep(delay).await
}
