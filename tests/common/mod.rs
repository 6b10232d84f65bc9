#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;
use tradeterm::domain::error::TradetermError;
use tradeterm::domain::feed::{CandleFeed, FeedConfig, FeedMode};
pub use tradeterm::domain::ohlcv::Bar;
use tradeterm::domain::period::Period;
use tradeterm::domain::throttle::{ThrottleConfig, ThrottledSource};
use tradeterm::ports::bar_cache_port::{BarCache, CachedRange};
use tradeterm::ports::bar_source_port::BarSource;
use tradeterm::ports::clock_port::Clock;

/// Remote history shared with the test through `Rc` so it can grow while the
/// feed owns the source.
#[derive(Clone, Default)]
pub struct MockBarSource {
    pub history: Rc<RefCell<BTreeMap<Period, Vec<Bar>>>>,
    pub fetches: Rc<Cell<u32>>,
    pub fail_next: Rc<Cell<u32>>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, period: Period, bars: Vec<Bar>) -> Self {
        self.history.borrow_mut().insert(period, bars);
        self
    }

    pub fn push(&self, period: Period, bar: Bar) {
        self.history.borrow_mut().entry(period).or_default().push(bar);
    }

    /// Fail the next `n` fetches with a transient error.
    pub fn failing(self, n: u32) -> Self {
        self.fail_next.set(n);
        self
    }
}

impl BarSource for MockBarSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch(
        &self,
        _instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail_next.get() > 0 {
            self.fail_next.set(self.fail_next.get() - 1);
            return Err(TradetermError::Remote {
                reason: "connection reset".into(),
            });
        }
        Ok(self
            .history
            .borrow()
            .get(&period)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.time >= from && b.time <= to)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

type CacheKey = (String, Period, NaiveDateTime);

#[derive(Clone, Default)]
pub struct MemoryCache {
    pub bars: Rc<RefCell<BTreeMap<CacheKey, Bar>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instrument: &str, period: Period, time: NaiveDateTime) -> Option<Bar> {
        self.bars
            .borrow()
            .get(&(instrument.to_string(), period, time))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.bars.borrow().len()
    }
}

impl BarCache for MemoryCache {
    fn query(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        Ok(self
            .bars
            .borrow()
            .range((instrument.to_string(), period, from)..=(instrument.to_string(), period, to))
            .map(|(_, bar)| *bar)
            .collect())
    }

    fn upsert(
        &self,
        instrument: &str,
        period: Period,
        bars: &[Bar],
    ) -> Result<usize, TradetermError> {
        let mut map = self.bars.borrow_mut();
        for bar in bars {
            map.insert((instrument.to_string(), period, bar.time), *bar);
        }
        Ok(bars.len())
    }

    fn count(&self, instrument: &str, period: Period) -> Result<usize, TradetermError> {
        Ok(self
            .bars
            .borrow()
            .keys()
            .filter(|(i, p, _)| i == instrument && *p == period)
            .count())
    }

    fn ranges(&self) -> Result<Vec<CachedRange>, TradetermError> {
        let mut ranges: BTreeMap<(String, Period), CachedRange> = BTreeMap::new();
        for (instrument, period, time) in self.bars.borrow().keys() {
            ranges
                .entry((instrument.clone(), *period))
                .and_modify(|r| {
                    r.last = *time;
                    r.bars += 1;
                })
                .or_insert(CachedRange {
                    instrument: instrument.clone(),
                    period: *period,
                    first: *time,
                    last: *time,
                    bars: 1,
                });
        }
        Ok(ranges.into_values().collect())
    }
}

/// Clock under test control. Sleeping advances it instead of blocking.
#[derive(Clone)]
pub struct ManualClock {
    pub now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        self.now.set(self.now.get() + step);
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn hour(h: u32) -> NaiveDateTime {
    at(1, h, 0)
}

/// Up bar around `close`, wide enough to give distinct high and low.
pub fn bar(time: NaiveDateTime, close: f64) -> Bar {
    Bar {
        time,
        open: close - 1.0,
        high: close + 2.0,
        low: close - 3.0,
        close,
    }
}

/// One bar per `period` bucket starting at `start`.
pub fn series(start: NaiveDateTime, period: Period, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| bar(start + period.duration() * i as i32, c))
        .collect()
}

/// `count` bars with closes 100, 101, 102, ...
pub fn rising(start: NaiveDateTime, period: Period, count: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| 100.0 + i as f64).collect();
    series(start, period, &closes)
}

pub fn fast_throttle() -> ThrottleConfig {
    ThrottleConfig {
        min_interval: Duration::ZERO,
        max_retries: 2,
        retry_delay: Duration::ZERO,
    }
}

pub fn backtest_config(
    period: Period,
    window: usize,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> FeedConfig {
    FeedConfig {
        instrument: "btc_jpy".into(),
        period,
        window,
        lookback: 0,
        mode: FeedMode::Backtest { from, to },
        tick_period: None,
    }
}

pub fn make_feed(
    config: FeedConfig,
    cache: &MemoryCache,
    source: &MockBarSource,
    clock: ManualClock,
) -> CandleFeed {
    CandleFeed::new(
        config,
        Box::new(cache.clone()),
        ThrottledSource::new(Box::new(source.clone()), fast_throttle()),
        Box::new(clock),
    )
}
