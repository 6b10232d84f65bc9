//! Trading periods and calendar bucket arithmetic.
//!
//! Every bar timestamp in the system is a bucket start produced by
//! [`Period::floor`]. Intraday periods all divide a day evenly, so buckets are
//! aligned to midnight; daily buckets start at midnight and weekly buckets on
//! Monday 00:00.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    H8,
    H12,
    D1,
    W1,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown period: {0} (expected one of 1m 5m 15m 30m 1h 4h 8h 12h 1d 1w)")]
pub struct ParsePeriodError(pub String);

impl Period {
    /// Finest to coarsest.
    pub const ALL: [Period; 10] = [
        Period::M1,
        Period::M5,
        Period::M15,
        Period::M30,
        Period::H1,
        Period::H4,
        Period::H8,
        Period::H12,
        Period::D1,
        Period::W1,
    ];

    pub fn minutes(self) -> i64 {
        match self {
            Period::M1 => 1,
            Period::M5 => 5,
            Period::M15 => 15,
            Period::M30 => 30,
            Period::H1 => 60,
            Period::H4 => 240,
            Period::H8 => 480,
            Period::H12 => 720,
            Period::D1 => 1440,
            Period::W1 => 10080,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Resolution code understood by the exchange chart API.
    pub fn api_code(self) -> &'static str {
        match self {
            Period::M1 => "1",
            Period::M5 => "5",
            Period::M15 => "15",
            Period::M30 => "30",
            Period::H1 => "60",
            Period::H4 => "240",
            Period::H8 => "480",
            Period::H12 => "720",
            Period::D1 => "D",
            Period::W1 => "W",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::M1 => "1m",
            Period::M5 => "5m",
            Period::M15 => "15m",
            Period::M30 => "30m",
            Period::H1 => "1h",
            Period::H4 => "4h",
            Period::H8 => "8h",
            Period::H12 => "12h",
            Period::D1 => "1d",
            Period::W1 => "1w",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }

    /// Step `level` periods finer (positive) or coarser (negative), clamped
    /// to the ends of [`Period::ALL`].
    pub fn zoom(self, level: i32) -> Period {
        let last = (Self::ALL.len() - 1) as i64;
        let idx = (self.index() as i64 - level as i64).clamp(0, last);
        Self::ALL[idx as usize]
    }

    /// Whether `self` buckets tile `coarser` buckets exactly.
    pub fn divides(self, coarser: Period) -> bool {
        coarser.minutes() % self.minutes() == 0
    }

    /// Start of the bucket containing `dt`. Seconds are always dropped.
    pub fn floor(self, dt: NaiveDateTime) -> NaiveDateTime {
        let midnight = dt.date().and_time(NaiveTime::MIN);
        match self {
            Period::D1 => midnight,
            Period::W1 => {
                let back = dt.weekday().num_days_from_monday() as i64;
                midnight - Duration::days(back)
            }
            _ => {
                let minute_of_day = (dt.hour() * 60 + dt.minute()) as i64;
                let floored = minute_of_day / self.minutes() * self.minutes();
                midnight + Duration::minutes(floored)
            }
        }
    }

    /// `dt` itself when it is a bucket start, otherwise the next bucket start.
    pub fn ceil(self, dt: NaiveDateTime) -> NaiveDateTime {
        let floored = self.floor(dt);
        if floored == dt {
            dt
        } else {
            self.floor(dt + self.duration())
        }
    }

    pub fn is_aligned(self, dt: NaiveDateTime) -> bool {
        self.floor(dt) == dt
    }

    /// Number of bucket starts in `[from, to]`, boundaries included.
    pub fn bar_count(self, from: NaiveDateTime, to: NaiveDateTime) -> usize {
        let first = self.ceil(from);
        let last = self.floor(to);
        if last < first {
            return 0;
        }
        ((last - first).num_minutes() / self.minutes()) as usize + 1
    }

    /// Buckets elapsed from the bucket of `from` to the bucket of `to`.
    pub fn bars_between(self, from: NaiveDateTime, to: NaiveDateTime) -> usize {
        let start = self.floor(from);
        let end = self.floor(to);
        if end <= start {
            return 0;
        }
        ((end - start).num_minutes() / self.minutes()) as usize
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == trimmed)
            .ok_or_else(|| ParsePeriodError(trimmed.to_string()))
    }
}
