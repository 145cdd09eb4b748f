//! Store configuration.

use std::time::Duration;

/// Rule for resolving a detected deadlock cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlockPolicy {
    /// The transaction whose acquisition would close the cycle fails.
    ///
    /// The requester has done the least work among the participants and is
    /// known to the caller, so this is the default.
    #[default]
    RequesterVictim,

    /// The youngest participant in the cycle (largest transaction ID)
    /// fails, whether or not it is the requester.
    DeterministicVictim,
}

/// Configuration for constructing a [`crate::CachingStore`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries in the shared cache.
    ///
    /// `0` disables the shared tier entirely; transactions still buffer
    /// privately and all functional behavior is preserved.
    pub cache_capacity: usize,

    /// Deadlock-cycle resolution rule.
    pub deadlock_policy: DeadlockPolicy,

    /// Maximum wait for a lock before the requester is victimized.
    ///
    /// `Duration::ZERO` means wait forever (deadlocks are still broken by
    /// cycle detection).
    pub acquire_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            deadlock_policy: DeadlockPolicy::default(),
            acquire_timeout: Duration::ZERO,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shared-cache capacity.
    #[must_use]
    pub const fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Sets the deadlock-resolution policy.
    #[must_use]
    pub const fn deadlock_policy(mut self, policy: DeadlockPolicy) -> Self {
        self.deadlock_policy = policy;
        self
    }

    /// Sets the lock-acquisition timeout.
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}
