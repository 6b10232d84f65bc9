use crate::ports::clock_port::Clock;
use chrono::{NaiveDateTime, Utc};

/// Wall clock in naive UTC, matching the times the chart API reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
