//! Local bar cache port.

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use chrono::NaiveDateTime;

/// Summary of what the cache holds for one (instrument, period) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRange {
    pub instrument: String,
    pub period: Period,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub bars: usize,
}

/// Bars keyed by (instrument, period, time).
pub trait BarCache {
    /// Bars with `from <= time <= to`, ascending by time.
    fn query(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError>;

    /// Insert or overwrite each bar by its time. Returns the number written.
    fn upsert(&self, instrument: &str, period: Period, bars: &[Bar])
    -> Result<usize, TradetermError>;

    fn count(&self, instrument: &str, period: Period) -> Result<usize, TradetermError>;

    fn ranges(&self) -> Result<Vec<CachedRange>, TradetermError>;
}
