//! Internal deadline/interval bookkeeping for the polling loops.
//!
//! Both backends run the same loop shape: attempt, then sleep a fixed interval,
//! then re-check the wall-clock budget. [`Poller`] owns that arithmetic so the
//! backends only decide what an attempt does. It also accumulates the number of
//! candidate messages inspected, which the terminal timeout error carries for
//! diagnostics.
//!
//! Built on the tokio clock so tests can drive it under `start_paused`.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks one retrieval call's polling budget.
#[derive(Debug)]
pub(crate) struct Poller {
    started: Instant,
    deadline: Instant,
    interval: Duration,
    candidates: usize,
}

impl Poller {
    /// Starts the clock on a new polling budget.
    pub(crate) fn start(timeout: Duration, interval: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
            interval,
            candidates: 0,
        }
    }

    /// Records candidate messages inspected during an attempt.
    pub(crate) fn record_candidates(&mut self, count: usize) {
        self.candidates += count;
    }

    /// Sleeps until the next attempt is due.
    ///
    /// Sleeps `min(interval, remaining budget)`; once the deadline has passed
    /// (before or after the sleep) returns [`Error::WaitTimeout`] carrying the
    /// elapsed wall-clock time and the cumulative candidate count. The caller's
    /// loop therefore never runs past the deadline by more than one interval
    /// and never reports a timeout before the full budget has elapsed.
    pub(crate) async fn wait(&mut self) -> Result<()> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(self.timeout_error());
        }

        let remaining = self.deadline - now;
        tokio::time::sleep(remaining.min(self.interval)).await;

        if Instant::now() >= self.deadline {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    fn timeout_error(&self) -> Error {
        Error::WaitTimeout {
            waited: self.started.elapsed(),
            candidates: self.candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_full_budget_elapses_before_timeout() {
        let timeout = Duration::from_secs(60);
        let mut poller = Poller::start(timeout, Duration::from_secs(5));
        let t0 = Instant::now();

        let mut successful_waits = 0;
        let err = loop {
            match poller.wait().await {
                Ok(()) => successful_waits += 1,
                Err(err) => break err,
            }
        };

        // 11 five-second sleeps succeed; the 12th lands on the deadline.
        assert_eq!(successful_waits, 11);
        assert_eq!(t0.elapsed(), timeout);

        match err {
            Error::WaitTimeout { waited, candidates } => {
                assert_eq!(waited, timeout);
                assert_eq!(candidates, 0);
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_sleep_clamped_to_remaining_budget() {
        let timeout = Duration::from_secs(7);
        let mut poller = Poller::start(timeout, Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(poller.wait().await.is_ok());
        let err = poller.wait().await.unwrap_err();

        // Second sleep is clamped to the 2 s remaining, not a full interval.
        assert_eq!(t0.elapsed(), timeout);
        assert!(matches!(err, Error::WaitTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_candidate_count_reaches_timeout_error() {
        let mut poller = Poller::start(Duration::from_secs(5), Duration::from_secs(5));
        poller.record_candidates(2);
        poller.record_candidates(1);

        let err = poller.wait().await.unwrap_err();
        match err {
            Error::WaitTimeout { candidates, .. } => assert_eq!(candidates, 3),
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_fails_without_sleeping() {
        let mut poller = Poller::start(Duration::from_secs(1), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(2)).await;

        let t0 = Instant::now();
        let err = poller.wait().await.unwrap_err();
        // No further sleep once the deadline is behind us.
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert!(matches!(err, Error::WaitTimeout { .. }));
    }
}
