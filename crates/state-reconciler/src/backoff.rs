//! # Fibonacci Poll Backoff
//!
//! Provides the floor-bounded backoff used between status polls.
//! The sequence grows more slowly than exponential backoff, so a resource that
//! settles after a handful of polls is still observed promptly, while a
//! long-running boot does not hammer the API.
//!
//! Sequence for a 2s floor and 10s ceiling: 2s, 2s, 4s, 6s, 10s, 10s, ...

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting from `floor` twice
/// and capped at `ceiling`. No value is ever below `floor`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    /// Previous backoff value
    prev: Duration,
    /// Current backoff value
    current: Duration,
    /// Maximum backoff value
    ceiling: Duration,
}

impl PollBackoff {
    /// Create a new backoff bounded by `floor` and `ceiling`.
    ///
    /// A ceiling below the floor is raised to the floor.
    #[must_use]
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: floor,
            ceiling: ceiling.max(floor),
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = std::cmp::min(next, self.ceiling);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_backoff_sequence() {
        let mut backoff = PollBackoff::new(Duration::from_secs(2), Duration::from_secs(10));

        assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(2));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(4));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(6));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        // Next would be 16s, capped at 10s
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(10));
    }

    #[test]
    fn test_poll_backoff_never_below_floor() {
        let floor = Duration::from_millis(300);
        let mut backoff = PollBackoff::new(floor, Duration::from_millis(100));

        for _ in 0..10 {
            assert_eq!(backoff.next_backoff(), floor);
        }
    }

    #[test]
    fn test_poll_backoff_fixed_when_floor_equals_ceiling() {
        let mut backoff = PollBackoff::new(Duration::from_secs(3), Duration::from_secs(3));

        assert_eq!(backoff.next_backoff(), Duration::from_secs(3));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(3));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(3));
    }
}
