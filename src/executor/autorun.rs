//! Startup stabilization
//!
//! Decides when registration has settled so a run can start without an
//! explicit call. The pending count is polled at a fixed interval:
//!
//! - unchanged and non-zero between two polls: start
//! - still zero after `initial_wait`: give up
//! - still changing at `max_wait`: start anyway

use std::time::Duration;

use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartDecision {
    /// Count held steady at this many tests
    Stable(usize),
    /// Hit the hard limit with this many tests pending
    Forced(usize),
    /// Nothing was ever registered
    Empty,
    /// An explicit run happened meanwhile
    Suppressed,
}

impl StartDecision {
    pub fn should_run(&self) -> bool {
        matches!(self, StartDecision::Stable(_) | StartDecision::Forced(_))
    }
}

/// Floor for the poll interval; a zero interval would never accumulate wait time
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct Stabilizer {
    pub interval: Duration,
    pub initial_wait: Duration,
    pub max_wait: Duration,
}

impl Default for Stabilizer {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            initial_wait: Duration::from_millis(200),
            max_wait: Duration::from_millis(5000),
        }
    }
}

impl Stabilizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_initial_wait(mut self, wait: Duration) -> Self {
        self.initial_wait = wait;
        self
    }

    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }

    /// Poll `pending` until registration settles.
    ///
    /// `suppressed` is checked before every decision; once it returns true
    /// the wait ends with [`StartDecision::Suppressed`].
    pub async fn wait<P, S>(&self, pending: P, suppressed: S) -> StartDecision
    where
        P: Fn() -> usize,
        S: Fn() -> bool,
    {
        let interval = self.interval.max(MIN_INTERVAL);
        let mut last = 0;
        let mut waited = Duration::ZERO;

        loop {
            tokio::time::sleep(interval).await;
            waited += interval;

            if suppressed() {
                return StartDecision::Suppressed;
            }

            let count = pending();
            if count > 0 && count == last {
                debug!("registration stable at {} tests after {:?}", count, waited);
                return StartDecision::Stable(count);
            }
            if count == 0 && waited > self.initial_wait {
                return StartDecision::Empty;
            }
            if waited >= self.max_wait {
                debug!("registration still changing after {:?}", waited);
                return if count > 0 {
                    StartDecision::Forced(count)
                } else {
                    StartDecision::Empty
                };
            }
            last = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> Stabilizer {
        Stabilizer::new()
            .with_interval(Duration::from_millis(1))
            .with_initial_wait(Duration::from_millis(20))
            .with_max_wait(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_stable_count_starts() {
        let decision = fast().wait(|| 3, || false).await;
        assert_eq!(decision, StartDecision::Stable(3));
        assert!(decision.should_run());
    }

    #[tokio::test]
    async fn test_empty_gives_up() {
        let decision = fast().wait(|| 0, || false).await;
        assert_eq!(decision, StartDecision::Empty);
        assert!(!decision.should_run());
    }

    #[tokio::test]
    async fn test_growing_registry_is_forced() {
        let counter = AtomicUsize::new(0);
        let decision = fast()
            .wait(|| counter.fetch_add(1, Ordering::SeqCst) + 1, || false)
            .await;
        assert!(matches!(decision, StartDecision::Forced(n) if n > 0));
    }

    #[tokio::test]
    async fn test_zero_interval_still_gives_up() {
        let stabilizer = fast().with_interval(Duration::ZERO);
        let decision = tokio::time::timeout(
            Duration::from_secs(2),
            stabilizer.wait(|| 0, || false),
        )
        .await
        .expect("zero interval must not spin forever");
        assert_eq!(decision, StartDecision::Empty);
    }

    #[tokio::test]
    async fn test_suppressed() {
        let decision = fast().wait(|| 5, || true).await;
        assert_eq!(decision, StartDecision::Suppressed);
    }

    #[test]
    fn test_default_timing() {
        let stabilizer = Stabilizer::default();
        assert_eq!(stabilizer.interval, Duration::from_millis(10));
        assert_eq!(stabilizer.initial_wait, Duration::from_millis(200));
        assert_eq!(stabilizer.max_wait, Duration::from_millis(5000));
    }
}
