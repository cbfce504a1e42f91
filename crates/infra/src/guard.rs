//! Process-wide mutual exclusion for stock mutations.
//!
//! Intake and order fulfillment both read the cache, write the ledger and then
//! write the cache back. Two of them interleaving would publish a cache value
//! computed from a stale read, so every mutation holds the guard for its whole
//! duration. Availability and insight reads never take it.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("timed out after {0:?} waiting to mutate stock")]
    Timeout(Duration),
}

/// FIFO mutex serializing stock mutations.
#[derive(Debug, Default)]
pub struct MutationGuard {
    lock: Mutex<()>,
    timeout: Option<Duration>,
}

/// Held for the duration of one mutation; released on drop.
#[derive(Debug)]
pub struct MutationPermit<'a> {
    _held: MutexGuard<'a, ()>,
}

impl MutationGuard {
    /// A guard that waits indefinitely, or at most `timeout` when given.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            lock: Mutex::new(()),
            timeout,
        }
    }

    pub async fn acquire(&self, operation: &'static str) -> Result<MutationPermit<'_>, GuardError> {
        let held = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.lock.lock())
                .await
                .map_err(|_| GuardError::Timeout(limit))?,
            None => self.lock.lock().await,
        };
        debug!(operation, "mutation guard acquired");
        Ok(MutationPermit { _held: held })
    }

    /// Whether a mutation currently holds the guard.
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_times_out_while_held() {
        let guard = MutationGuard::new(Some(Duration::from_millis(20)));

        let permit = guard.acquire("intake").await.unwrap();
        assert!(guard.is_held());
        let err = guard.acquire("order").await.unwrap_err();
        assert_eq!(err, GuardError::Timeout(Duration::from_millis(20)));

        drop(permit);
        assert!(!guard.is_held());
        assert!(guard.acquire("order").await.is_ok());
    }
}
