//! Wall clock and sleeping, so the live loop can run against simulated time.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn sleep(&mut self, duration: Duration);
}
