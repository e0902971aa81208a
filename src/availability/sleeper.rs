//! Injectable sleeping
//!
//! Every wait in a run (poll interval, submission backoff, bulk-polling
//! rounds) goes through a [`Sleeper`], so tests can record the requested
//! delays instead of blocking.

use std::time::Duration;

/// Blocks the current run for a duration
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
