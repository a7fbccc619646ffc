//! Loop cadence.

use std::time::{Duration, Instant};

/// Decides when the next loop iteration runs.
pub trait FrameScheduler {
    /// Block until the next iteration is due; returns the time since start.
    fn wait_next(&mut self) -> Duration;
}

/// Paces iterations at a display refresh rate.
pub struct RefreshScheduler {
    interval: Duration,
    start: Instant,
    next: Instant,
}

impl RefreshScheduler {
    pub fn new(refresh_hz: u32) -> Self {
        let start = Instant::now();
        Self {
            interval: Duration::from_secs(1) / refresh_hz.max(1),
            start,
            next: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl FrameScheduler for RefreshScheduler {
    fn wait_next(&mut self) -> Duration {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }
        let now = Instant::now();
        self.next += self.interval;
        if self.next < now {
            self.next = now + self.interval;
        }
        now - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut scheduler = RefreshScheduler::new(500);
        let first = scheduler.wait_next();
        let second = scheduler.wait_next();
        assert!(second >= first + Duration::from_millis(1));
        assert_eq!(scheduler.interval(), Duration::from_millis(2));
    }
}
