//! Frame-rate cap for recording over a faster render loop.

use std::time::Duration;

/// Ticks arriving this close to the deadline count as on time.
const SLACK: Duration = Duration::from_millis(1);

/// Decides which loop iterations feed the encoder, capping the rate at `fps`.
#[derive(Clone, Debug)]
pub struct FrameSampler {
    interval: Duration,
    next_due: Option<Duration>,
}

impl FrameSampler {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / fps.max(1),
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a frame observed at `now` should be captured.
    pub fn should_sample(&mut self, now: Duration) -> bool {
        match self.next_due {
            Some(due) if now + SLACK < due => false,
            Some(due) => {
                // Fell more than a frame behind: resync instead of bursting.
                let next = due + self.interval;
                self.next_due = Some(if next <= now { now + self.interval } else { next });
                true
            }
            None => {
                self.next_due = Some(now + self.interval);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_sixty_hz_ticks_to_thirty_fps() {
        let mut sampler = FrameSampler::new(30);
        let tick = Duration::from_secs(1) / 60;
        let sampled = (0..60)
            .filter(|i| sampler.should_sample(tick * *i))
            .count();
        assert_eq!(sampled, 30);
    }

    #[test]
    fn resyncs_after_a_stall() {
        let mut sampler = FrameSampler::new(30);
        assert!(sampler.should_sample(Duration::ZERO));
        assert!(sampler.should_sample(Duration::from_secs(2)));
        assert!(!sampler.should_sample(Duration::from_secs(2) + Duration::from_millis(10)));
    }
}
