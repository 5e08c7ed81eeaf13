//! Bounded retry for transient I/O failures.

use serde::{Deserialize, Serialize};
use std::io;
use std::thread;
use std::time::Duration;

/// How often and how patiently to retry a transient I/O failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub attempts: u32,
    /// Delay before the second attempt; grows linearly afterwards
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Run `op`, retrying while it fails with a transient error kind.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> io::Result<T>
    where
        F: FnMut() -> io::Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && is_transient(&err) => {
                    tracing::warn!(
                        operation = what,
                        attempt,
                        error = %err,
                        "transient I/O failure, retrying"
                    );
                    thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_transient_errors() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        };
        let mut calls = 0;
        let result = policy.run("test", || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::new(io::ErrorKind::Interrupted, "try again"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let policy = RetryPolicy {
            attempts: 2,
            backoff: Duration::ZERO,
        };
        let mut calls = 0;
        let result: io::Result<()> = policy.run("test", || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::TimedOut, "slow disk"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: io::Result<()> = RetryPolicy::default().run("test", || {
            calls += 1;
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
