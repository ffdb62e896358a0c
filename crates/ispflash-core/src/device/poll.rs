//! Bounded fixed-interval polling.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cancel::CancelToken;

/// Poll interval and the total wait budget it is spread over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl PollPolicy {
    pub const fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// `ceil(timeout / interval)`, at least one poll.
    pub fn max_polls(&self) -> u32 {
        let interval = self.interval_ms.max(1);
        let polls = self.timeout_ms.div_ceil(interval).max(1);
        u32::try_from(polls).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Condition met on poll number `polls` (1-based).
    Ready { polls: u32 },
    TimedOut { polls: u32 },
    Cancelled,
}

/// Call `check` until it returns `true`, at most `policy.max_polls()` times.
///
/// Sleeps one interval between polls, never after the last one. Errors from
/// `check` end polling immediately.
pub fn poll_until<E, F>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    mut check: F,
) -> Result<PollOutcome, E>
where
    F: FnMut() -> Result<bool, E>,
{
    let max = policy.max_polls();
    for poll in 1..=max {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }
        if check()? {
            return Ok(PollOutcome::Ready { polls: poll });
        }
        trace!(poll, max, "Not ready");
        if poll < max {
            thread::sleep(policy.interval());
        }
    }
    Ok(PollOutcome::TimedOut { polls: max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_polls() {
        assert_eq!(PollPolicy::new(10, 10_000).max_polls(), 1000);
        assert_eq!(PollPolicy::new(10, 15).max_polls(), 2);
        assert_eq!(PollPolicy::new(10, 0).max_polls(), 1);
        assert_eq!(PollPolicy::new(0, 5).max_polls(), 5);
    }

    #[test]
    fn test_times_out_after_exact_bound() {
        let policy = PollPolicy::new(1, 7);
        let mut calls = 0;
        let outcome: Result<_, ()> = poll_until(&policy, &CancelToken::new(), || {
            calls += 1;
            Ok(false)
        });
        assert_eq!(outcome, Ok(PollOutcome::TimedOut { polls: 7 }));
        assert_eq!(calls, 7);
    }

    #[test]
    fn test_ready_early() {
        let policy = PollPolicy::new(1, 100);
        let mut calls = 0;
        let outcome: Result<_, ()> = poll_until(&policy, &CancelToken::new(), || {
            calls += 1;
            Ok(calls == 3)
        });
        assert_eq!(outcome, Ok(PollOutcome::Ready { polls: 3 }));
    }

    #[test]
    fn test_error_stops_polling() {
        let policy = PollPolicy::new(1, 100);
        let mut calls = 0;
        let outcome = poll_until(&policy, &CancelToken::new(), || {
            calls += 1;
            if calls == 2 { Err("bus gone") } else { Ok(false) }
        });
        assert_eq!(outcome, Err("bus gone"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome: Result<_, ()> = poll_until(&PollPolicy::new(1, 100), &cancel, || Ok(false));
        assert_eq!(outcome, Ok(PollOutcome::Cancelled));
    }
}
