// # Instance Lock
//
// Guards the message logs of one instance.
//
// ## Acquisition
//
// `acquire()` queues on an async mutex, but each wait is bounded by a short
// random slice (1-5 ms by default). After `max_attempts` slices the caller
// gives up and skips its update. Overlapping callers therefore never
// interleave partial writes, and no caller waits forever.
//
// The guard unlocks on drop, so every exit path of a critical section
// releases the lock.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

use crate::config::LockConfig;

/// Bounded acquisition policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Number of bounded waits before giving up
    pub max_attempts: u32,
    /// Shortest wait per attempt
    pub min_backoff: Duration,
    /// Longest wait per attempt
    pub max_backoff: Duration,
}

impl LockPolicy {
    /// Wait slice for the next attempt, chosen uniformly between the bounds
    pub fn backoff(&self) -> Duration {
        let min = self.min_backoff.as_micros() as u64;
        let max = (self.max_backoff.as_micros() as u64).max(min);
        let micros = rand::thread_rng().gen_range(min..=max);
        Duration::from_micros(micros)
    }

    /// Upper bound of the total time spent in `acquire()`
    pub fn max_wait(&self) -> Duration {
        self.max_backoff * self.max_attempts
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::from(&LockConfig::default())
    }
}

impl From<&LockConfig> for LockPolicy {
    fn from(config: &LockConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Per-instance mutual exclusion around `T`
#[derive(Debug)]
pub struct InstanceLock<T> {
    name: String,
    policy: LockPolicy,
    inner: Arc<Mutex<T>>,
}

impl<T> InstanceLock<T> {
    /// Create a lock named `name` (used in logs) around `value`
    pub fn new(name: impl Into<String>, policy: LockPolicy, value: T) -> Self {
        Self {
            name: name.into(),
            policy,
            inner: Arc::new(Mutex::new(value)),
        }
    }

    /// Name used in log output
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquisition policy
    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Try to take the lock within the policy's attempt budget
    ///
    /// Returns `None` when every attempt timed out.
    pub async fn acquire(&self) -> Option<OwnedMutexGuard<T>> {
        for attempt in 1..=self.policy.max_attempts {
            let slice = self.policy.backoff();
            match tokio::time::timeout(slice, Arc::clone(&self.inner).lock_owned()).await {
                Ok(guard) => {
                    trace!("Lock {} acquired on attempt {}", self.name, attempt);
                    return Some(guard);
                }
                Err(_) => {
                    trace!("Lock {} busy (attempt {})", self.name, attempt);
                }
            }
        }

        warn!(
            "Lock {} not acquired after {} attempts, giving up",
            self.name, self.policy.max_attempts
        );
        None
    }

    /// Wait for the lock without a budget
    ///
    /// Reserved for short critical sections that must not be skipped.
    pub async fn lock(&self) -> OwnedMutexGuard<T> {
        Arc::clone(&self.inner).lock_owned().await
    }
}
