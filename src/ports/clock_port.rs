//! Wall clock port.

use chrono::NaiveDateTime;
use std::time::Duration;

pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    /// Block the calling thread. Test clocks advance `now` instead.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
