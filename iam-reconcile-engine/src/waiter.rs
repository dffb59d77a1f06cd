//! Bounded backoff for control-plane propagation.
//!
//! IAM writes are accepted before they are visible to every subsequent read;
//! a dependent call issued immediately after a create can fail with a
//! transient not-found. The waiter gives mutations a head start. It is a
//! mitigation, not a guarantee: callers still treat transient errors as
//! retryable.

use log::trace;
use std::time::Duration;
use tokio::time::sleep;

/// The kind of mutation that just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropagationKind {
    Role,
    Policy,
    Attachment,
    Bucket,
}

/// Computes and applies post-mutation delays.
///
/// [`PropagationWaiter::disabled`] makes every delay zero, which is what
/// tests against an in-memory provider want.
#[derive(Debug, Clone)]
pub struct PropagationWaiter {
    base: Duration,
    cap: Duration,
}

impl PropagationWaiter {
    /// Exponential backoff: `base * 2^attempt`, saturating at `cap`.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// The same delay for every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// Zero-duration waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// The delay to apply after `attempt` (0-based) mutations of `kind`.
    pub fn delay_for(&self, kind: PropagationKind, attempt: u32) -> Duration {
        if self.base.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32 << attempt.min(16);
        let delay = self.base.saturating_mul(factor).min(self.cap);
        trace!("propagation delay for {kind:?}, attempt {attempt}: {delay:?}");
        delay
    }

    /// Sleep for [`PropagationWaiter::delay_for`].
    pub async fn wait(&self, kind: PropagationKind, attempt: u32) {
        let delay = self.delay_for(kind, attempt);
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

impl Default for PropagationWaiter {
    /// The short fixed delay control-plane scripts conventionally use.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_waiter_never_delays() {
        let waiter = PropagationWaiter::disabled();
        for attempt in 0..10 {
            assert_eq!(
                waiter.delay_for(PropagationKind::Role, attempt),
                Duration::ZERO
            );
        }
    }

    #[test]
    fn fixed_waiter_ignores_attempt() {
        let waiter = PropagationWaiter::fixed(Duration::from_secs(2));
        assert_eq!(
            waiter.delay_for(PropagationKind::Policy, 0),
            Duration::from_secs(2)
        );
        assert_eq!(
            waiter.delay_for(PropagationKind::Policy, 7),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn exponential_backoff_saturates_at_cap() {
        let waiter = PropagationWaiter::new(Duration::from_millis(100), Duration::from_secs(2));
        assert_eq!(
            waiter.delay_for(PropagationKind::Bucket, 0),
            Duration::from_millis(100)
        );
        assert_eq!(
            waiter.delay_for(PropagationKind::Bucket, 1),
            Duration::from_millis(200)
        );
        assert_eq!(
            waiter.delay_for(PropagationKind::Bucket, 10),
            Duration::from_secs(2)
        );
        assert_eq!(
            waiter.delay_for(PropagationKind::Bucket, 60),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_disabled() {
        let waiter = PropagationWaiter::disabled();
        let started = std::time::Instant::now();
        waiter.wait(PropagationKind::Attachment, 3).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
