//! Time source abstraction.
//!
//! Services and the in-process cache read the current instant through
//! [`Clock`] so the punch cooldown and entry expiry can be driven by tests.

use jiff::Timestamp;

#[cfg(test)]
pub(crate) use manual::ManualClock;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(test)]
mod manual {
    use std::sync::Mutex;

    use jiff::{SignedDuration, Timestamp};

    use super::Clock;

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        now: Mutex<Timestamp>,
    }

    impl ManualClock {
        pub(crate) fn new(start: Timestamp) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        /// Moves the clock forward (or backward for negative durations).
        pub(crate) fn advance(&self, by: SignedDuration) {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            *now = now.saturating_add(by).unwrap_or(*now);
        }

        pub(crate) fn set(&self, to: Timestamp) {
            *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            *self.now.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    #[test]
    fn test_manual_clock_advances() {
        let start: Timestamp = "2024-03-01T12:00:00Z".parse().unwrap();
        let clock = ManualClock::new(start);
        clock.advance(SignedDuration::from_secs(61));
        assert_eq!(clock.now(), "2024-03-01T12:01:01Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(Timestamp::UNIX_EPOCH);
        let target: Timestamp = "2030-01-01T00:00:00Z".parse().unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
