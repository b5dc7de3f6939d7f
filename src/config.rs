//! # Dispatcher configuration.
//!
//! Provides [`DispatcherConfig`], the settings a [`Dispatcher`](crate::Dispatcher)
//! is built from.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no per-unit timeout
//! - `grace = 0s` → do not wait for in-flight units after shutdown (abort at once)

use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::DispatchError;

/// Runtime settings of a dispatcher.
///
/// ## Field semantics
/// - `max_outstanding`: admission gate capacity (must be `>= 1`)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `timeout`: per-unit timeout (`0s` = none)
/// - `grace`: how long shutdown waits for in-flight units (`0s` = abort immediately)
///
/// All fields are public; prefer the accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Maximum number of units executing at the same time.
    ///
    /// Fixed for the dispatcher's lifetime.
    pub max_outstanding: usize,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Slow receivers lagging more than `bus_capacity` events skip older items.
    pub bus_capacity: usize,

    /// Per-unit timeout.
    ///
    /// On expiry the operation's cancellation token is cancelled, the future is
    /// dropped and the unit reports [`WorkError::Timeout`](crate::WorkError::Timeout).
    pub timeout: Duration,

    /// Maximum time to wait for in-flight units after shutdown is requested.
    ///
    /// Units still running afterwards are aborted and
    /// [`RuntimeError::GraceExceeded`](crate::RuntimeError::GraceExceeded) is returned.
    pub grace: Duration,
}

impl DispatcherConfig {
    /// Creates the default config with the given concurrency limit.
    pub fn with_max_outstanding(max_outstanding: usize) -> Self {
        Self {
            max_outstanding,
            ..Self::default()
        }
    }

    /// Checks the settings that cannot be clamped.
    ///
    /// # Example
    /// ```
    /// use fanvisor::{DispatcherConfig, DispatchError};
    ///
    /// let cfg = DispatcherConfig::with_max_outstanding(0);
    /// assert!(matches!(cfg.validate(), Err(DispatchError::InvalidCapacity { got: 0, .. })));
    /// ```
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_outstanding == 0 || self.max_outstanding > Semaphore::MAX_PERMITS {
            return Err(DispatchError::InvalidCapacity {
                got: self.max_outstanding,
                max: Semaphore::MAX_PERMITS,
            });
        }
        Ok(())
    }

    /// Returns the per-unit timeout as an `Option`.
    #[inline]
    pub fn unit_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for DispatcherConfig {
    /// Default configuration:
    ///
    /// - `max_outstanding = 4`
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no timeout)
    /// - `grace = 30s`
    fn default() -> Self {
        Self {
            max_outstanding: 4,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
            grace: Duration::from_secs(30),
        }
    }
}
