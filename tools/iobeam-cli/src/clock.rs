//! Host millisecond clock

use iobeam_embedded::Clock;
use std::time::Instant;

/// Milliseconds since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    start: Instant,
}

impl HostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HostClock {
    fn millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
