//! Wall-clock time and real sleeping.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
