use std::time::{Duration, Instant};

/// Measures how long a stretch of graph construction took.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn now() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Restart the measurement from now.
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    /// Time elapsed since creation or the last `reset`.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
