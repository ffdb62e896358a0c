//! Bounded retry for transient bus failures.

use std::fmt;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::{I2cTransport, TransportError};

/// How often and how fast a failed transaction is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 150,
            backoff_ms: 5,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub const NONE: Self = Self {
        max_attempts: 1,
        backoff_ms: 0,
    };

    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff_ms: backoff.as_millis() as u64,
        }
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Errors that distinguish transient from permanent failures.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub struct Exhausted<E> {
    /// Attempts made before giving up.
    pub attempts: u32,
    /// Error from the last attempt.
    pub last: E,
}

impl<E: fmt::Display> fmt::Display for Exhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempts: {}", self.attempts, self.last)
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is
/// spent.
///
/// Permanent errors stop immediately; the returned `Exhausted` then carries
/// the number of attempts actually made.
pub fn retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Result<T, Exhausted<E>>
where
    E: Transient + fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                debug!(attempt, error = %e, "Transient failure, retrying");
                thread::sleep(policy.backoff());
            }
            Err(e) => {
                return Err(Exhausted {
                    attempts: attempt,
                    last: e,
                });
            }
        }
    }
}

/// Transport wrapper that retries transient transaction failures.
///
/// `probe` is passed through untouched: liveness checks run their own
/// bounded polling loop and must see every individual failure.
pub struct RetryingTransport<T: I2cTransport> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: I2cTransport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<T: I2cTransport> I2cTransport for RetryingTransport<T> {
    fn transfer(&self, request: &[u8], read_len: usize) -> Result<Vec<u8>, TransportError> {
        retry(&self.policy, || self.inner.transfer(request, read_len)).map_err(|e| {
            if e.last.is_transient() {
                warn!(attempts = e.attempts, error = %e.last, "Bus retries exhausted");
                TransportError::Unavailable {
                    attempts: e.attempts,
                    last: Box::new(e.last),
                }
            } else {
                e.last
            }
        })
    }

    fn probe(&self) -> Result<(), TransportError> {
        self.inner.probe()
    }

    fn address(&self) -> u16 {
        self.inner.address()
    }
}
