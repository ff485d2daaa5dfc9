//! Monotonic time source injected into the store

use std::time::{Duration, Instant};

/// Monotonic clock used to bound the header-flush frequency
pub trait Clock: Send + Sync {
    /// Elapsed time since an arbitrary fixed origin
    fn monotonic(&self) -> Duration;
}

/// Clock backed by `std::time::Instant`
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a new system clock
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}
