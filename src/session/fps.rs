use std::time::{Duration, Instant};

/// Counts frames per wall-clock second.
///
/// The displayed value only changes once a full second has passed since the last reset; in
/// between it keeps showing the tally of the previous second.
#[derive(Debug)]
pub struct FpsCounter {
    last_reset: Instant,
    tally: u32,
    fps: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            last_reset: now,
            tally: 0,
            fps: 0,
        }
    }

    /// Record one processed frame at `now` and return the value to display.
    pub fn tick(&mut self, now: Instant) -> u32 {
        self.tally += 1;
        if now.duration_since(self.last_reset) >= Duration::from_secs(1) {
            self.fps = self.tally;
            self.tally = 0;
            self.last_reset = now;
        }
        self.fps
    }
}
