use std::time::{Duration, Instant};

/// Admits at most one frame per `interval`; frames in between are dropped.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Whether the frame arriving at `now` should be processed.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.saturating_duration_since(prev) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
