//! Interval timer
//!
//! Used to space receive-loop iterations and to tick the rate sampler.

use std::time::{Duration, Instant};

/// Timer for periodic operations
#[derive(Debug, Clone)]
pub struct Timer {
    interval: Duration,
    last_fire: Instant,
}

impl Timer {
    /// Create a new timer with the given interval, starting now
    pub fn new(interval: Duration) -> Self {
        Timer {
            interval,
            last_fire: Instant::now(),
        }
    }

    /// Check if the timer has expired
    pub fn expired(&self) -> bool {
        self.last_fire.elapsed() >= self.interval
    }

    /// Restart the interval from now
    pub fn reset(&mut self) {
        self.last_fire = Instant::now();
    }

    /// Get time until next expiration
    pub fn time_until_expiration(&self) -> Duration {
        self.interval.saturating_sub(self.last_fire.elapsed())
    }

    /// Fire the timer if expired, returning true if it fired
    ///
    /// The next interval is measured from the scheduled fire time rather than
    /// from now, so a late check does not shift later ticks.
    pub fn try_fire(&mut self) -> bool {
        if !self.expired() {
            return false;
        }
        self.last_fire += self.interval;
        if self.expired() {
            // Fell more than a whole interval behind; resynchronise.
            self.reset();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timer() {
        let mut timer = Timer::new(Duration::from_millis(10));
        assert!(!timer.expired());

        thread::sleep(Duration::from_millis(11));
        assert!(timer.expired());

        timer.reset();
        assert!(!timer.expired());
    }

    #[test]
    fn test_timer_try_fire() {
        let mut timer = Timer::new(Duration::from_millis(10));
        assert!(!timer.try_fire());

        thread::sleep(Duration::from_millis(11));
        assert!(timer.try_fire());
        assert!(!timer.try_fire());
    }

    #[test]
    fn test_time_until_expiration() {
        let timer = Timer::new(Duration::from_millis(200));
        let remaining = timer.time_until_expiration();
        assert!(remaining > Duration::from_millis(100));
        assert!(remaining <= Duration::from_millis(200));

        let elapsed = Timer::new(Duration::ZERO);
        assert_eq!(elapsed.time_until_expiration(), Duration::ZERO);
    }
}
