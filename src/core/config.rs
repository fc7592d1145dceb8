//! # Coordinator configuration.
//!
//! Provides [`RaceConfig`], the settings shared by every race a
//! [`Coordinator`](crate::Coordinator) runs.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no deadline (a race waits for the first success or the last failure)
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

/// Configuration for a [`Coordinator`](crate::Coordinator).
///
/// ## Field semantics
/// - `timeout`: Deadline for a decision (`0s` = none)
/// - `bus_capacity`: Event bus ring buffer size (min 1)
/// - `abort_stragglers`: Also abort the tokio task of every cancelled worker
///
/// All fields are public; prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct RaceConfig {
    /// Maximum time to wait for a decision.
    ///
    /// When it elapses the race fails with
    /// [`RaceError::TimedOut`](crate::RaceError::TimedOut) and every pending
    /// worker is cancelled exactly as on the success path.
    pub timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events skip
    /// the older ones.
    pub bus_capacity: usize,

    /// Abort the task of each straggler in addition to cancelling its token.
    ///
    /// - `false`: cancellation is advisory; a worker stops when it observes its token
    /// - `true`: the worker future is also dropped at its next await point
    pub abort_stragglers: bool,
}

impl RaceConfig {
    /// Returns the race deadline as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → decision must happen within `d`
    #[inline]
    pub fn race_timeout(&self) -> Option<Duration> {
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

impl Default for RaceConfig {
    /// Default configuration:
    ///
    /// - `timeout = 0s` (no deadline)
    /// - `bus_capacity = 1024`
    /// - `abort_stragglers = false` (cooperative cancellation only)
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            bus_capacity: 1024,
            abort_stragglers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_means_none() {
        let mut cfg = RaceConfig::default();
        assert_eq!(cfg.race_timeout(), None);
        cfg.timeout = Duration::from_millis(250);
        assert_eq!(cfg.race_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn bus_capacity_never_zero() {
        let cfg = RaceConfig {
            bus_capacity: 0,
            ..RaceConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
