//! Timeout policy for bounding async operation duration.
//!
//! Used throughout the engine to enforce Engine Max Runtime (EMR), Collector
//! Max Runtime (CMR), and sink/heartbeat send deadlines from a single,
//! consistently-tested primitive.
//!
//! Invariants:
//! - Duration must be > 0 and <= the configured maximum.
//! - Successful operations pass through untouched.
//! - On timeout the inner future is dropped (not forcibly aborted); callers
//!   that need partial-work cleanup must make their operation cancellation-safe.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum allowed timeout duration (30 days), guarding against accidental
/// `Duration::MAX`-style misconfiguration while still permitting long jobs.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors returned when configuring a [`TimeoutPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TimeoutError {
    #[error("timeout duration must be > 0")]
    ZeroDuration,
    #[error("timeout duration {requested:?} exceeds maximum allowed {limit:?}")]
    ExceedsMaximum { requested: Duration, limit: Duration },
}

/// A deadline elapsed before the wrapped operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {timeout:?} elapsed after {elapsed:?}")]
pub struct Elapsed {
    pub elapsed: Duration,
    pub timeout: Duration,
}

/// Policy that enforces a maximum duration on async operations.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    /// Creates a timeout policy with the specified duration.
    #[must_use = "the result must be checked for validation errors"]
    pub fn new(duration: Duration) -> Result<Self, TimeoutError> {
        Self::new_with_max(duration, MAX_TIMEOUT)
    }

    /// Construct with a caller-specified maximum allowed timeout.
    pub fn new_with_max(duration: Duration, max: Duration) -> Result<Self, TimeoutError> {
        if duration.is_zero() {
            return Err(TimeoutError::ZeroDuration);
        }
        if duration > max {
            return Err(TimeoutError::ExceedsMaximum { requested: duration, limit: max });
        }
        Ok(Self { duration })
    }

    #[must_use]
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Run `fut` to completion or until the configured deadline elapses.
    ///
    /// `elapsed` in the returned [`Elapsed`] is measured from just before
    /// polling `fut` and can exceed `timeout` slightly due to scheduling
    /// overhead.
    pub async fn run<T, Fut>(&self, fut: Fut) -> Result<T, Elapsed>
    where
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.duration, fut).await {
            Ok(value) => Ok(value),
            Err(_) => Err(Elapsed { elapsed: start.elapsed(), timeout: self.duration }),
        }
    }
}
