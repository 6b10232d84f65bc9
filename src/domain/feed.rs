//! Candle feed: the sliding OHLC window for one (instrument, period) pair.
//!
//! Windows are resolved read-through against the local [`BarCache`]. When the
//! cache holds fewer bars than the calendar expects for a range, a wider range
//! is fetched from the remote source, written back to the cache, and the range
//! is read again. Repeated backtests over the same range are pure cache hits.

use crate::domain::error::TradetermError;
use crate::domain::event::Event;
use crate::domain::ohlcv::{validate_series, Bar, Bars};
use crate::domain::period::Period;
use crate::domain::throttle::ThrottledSource;
use crate::domain::tick_sim::{bar_path, price_path, TickPlayer};
use crate::ports::bar_cache_port::BarCache;
use crate::ports::clock_port::Clock;
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedMode {
    /// Replay `[from, to]` from history.
    Backtest {
        from: NaiveDateTime,
        to: NaiveDateTime,
    },
    /// Poll the remote for the current time on every advance.
    Live,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub instrument: String,
    pub period: Period,
    /// Bars handed to consumers by `get_bars(0)`.
    pub window: usize,
    /// Extra history kept for indicator warmup.
    pub lookback: usize,
    pub mode: FeedMode,
    /// Replay each backtest bar as synthetic ticks built from this period.
    pub tick_period: Option<Period>,
}

impl FeedConfig {
    pub fn capacity(&self) -> usize {
        self.window + self.lookback
    }
}

fn span(period: Period, buckets: usize) -> Duration {
    Duration::minutes(period.minutes() * buckets as i64)
}

pub struct CandleFeed {
    config: FeedConfig,
    cache: Box<dyn BarCache>,
    source: ThrottledSource,
    clock: Box<dyn Clock>,
    cursor: Option<NaiveDateTime>,
    bars: Vec<Bar>,
    ticks: TickPlayer,
    updated: Event<CandleFeed>,
}

impl CandleFeed {
    pub fn new(
        config: FeedConfig,
        cache: Box<dyn BarCache>,
        source: ThrottledSource,
        clock: Box<dyn Clock>,
    ) -> Self {
        CandleFeed {
            config,
            cache,
            source,
            clock,
            cursor: None,
            bars: Vec::new(),
            ticks: TickPlayer::new(),
            updated: Event::new(),
        }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn instrument(&self) -> &str {
        &self.config.instrument
    }

    pub fn period(&self) -> Period {
        self.config.period
    }

    pub fn is_backtest(&self) -> bool {
        matches!(self.config.mode, FeedMode::Backtest { .. })
    }

    pub fn cursor(&self) -> Option<NaiveDateTime> {
        self.cursor
    }

    /// Feed time: the cursor once advanced, otherwise the start of the run.
    pub fn now(&self) -> NaiveDateTime {
        match (self.cursor, self.config.mode) {
            (Some(cursor), _) => cursor,
            (None, FeedMode::Backtest { from, .. }) => self.config.period.floor(from),
            (None, FeedMode::Live) => self.clock.now(),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn source(&self) -> &ThrottledSource {
        &self.source
    }

    pub fn on_updated(&self) -> &Event<CandleFeed> {
        &self.updated
    }

    /// Trailing `window + extra_lookback` bars, capped at what is loaded.
    pub fn get_bars(&self, extra_lookback: usize) -> Bars {
        let n = self.config.window + extra_lookback;
        let start = self.bars.len().saturating_sub(n);
        Bars::from_bars(&self.bars[start..])
    }

    /// Step to the next window state and notify subscribers.
    ///
    /// Returns `Ok(false)` without notifying once a backtest has passed its
    /// end time. Live feeds always return `Ok(true)`.
    pub fn advance(&mut self) -> Result<bool, TradetermError> {
        let moved = match self.config.mode {
            FeedMode::Backtest { from, to } => self.advance_backtest(from, to)?,
            FeedMode::Live => {
                self.advance_live()?;
                true
            }
        };
        if moved {
            self.updated.notify(self);
        }
        Ok(moved)
    }

    fn advance_backtest(
        &mut self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<bool, TradetermError> {
        if let Some(forming) = self.bars.last_mut() {
            if self.ticks.step(forming) {
                return Ok(true);
            }
        }

        let period = self.config.period;
        let next = match self.cursor {
            None => period.floor(from),
            Some(cursor) => cursor + period.duration(),
        };
        if next > to {
            return Ok(false);
        }

        self.cursor = Some(next);
        self.bars = self.resolve_window(next)?;

        if let Some(tick_period) = self.config.tick_period {
            self.load_ticks(next, tick_period)?;
        }
        Ok(true)
    }

    fn advance_live(&mut self) -> Result<(), TradetermError> {
        let period = self.config.period;
        let capacity = self.config.capacity();
        let now = self.clock.now();
        let range_from = period.floor(now) - span(period, capacity.saturating_sub(1));

        let fetched = self
            .source
            .fetch(&self.config.instrument, period, range_from, now)?;
        self.check_series(period, &fetched)?;

        // The bucket of `now` is still forming; only closed bars are cached.
        let forming = period.floor(now);
        let closed = fetched.partition_point(|bar| bar.time < forming);
        self.cache
            .upsert(&self.config.instrument, period, &fetched[..closed])?;

        let start = fetched.len().saturating_sub(capacity);
        self.bars = fetched[start..].to_vec();
        self.cursor = Some(now);
        Ok(())
    }

    /// Window of `capacity` buckets ending at the bucket containing `end`.
    pub fn resolve_window(&self, end: NaiveDateTime) -> Result<Vec<Bar>, TradetermError> {
        let period = self.config.period;
        let extra = span(period, self.config.capacity().saturating_sub(1));
        let range_to = period.floor(end);
        let range_from = range_to - extra;
        self.resolve_range(period, range_from, range_to, range_to + extra)
    }

    fn resolve_range(
        &self,
        period: Period,
        range_from: NaiveDateTime,
        range_to: NaiveDateTime,
        fetch_to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        let instrument = self.config.instrument.as_str();
        let expected = period.bar_count(range_from, range_to);

        let cached = self.cache.query(instrument, period, range_from, range_to)?;
        if cached.len() == expected {
            self.check_series(period, &cached)?;
            return Ok(cached);
        }

        tracing::debug!(
            instrument,
            %period,
            %range_from,
            %range_to,
            cached = cached.len(),
            expected,
            "cache miss"
        );

        let fetched = self.source.fetch(instrument, period, range_from, fetch_to)?;
        self.check_series(period, &fetched)?;
        let written = self.cache.upsert(instrument, period, &fetched)?;
        tracing::debug!(instrument, %period, written, "cache backfilled");

        let bars = self.cache.query(instrument, period, range_from, range_to)?;
        if bars.len() != expected {
            tracing::warn!(
                instrument,
                %period,
                %range_from,
                %range_to,
                got = bars.len(),
                expected,
                "remote history has gaps; using short window"
            );
        }
        self.check_series(period, &bars)?;
        Ok(bars)
    }

    fn load_ticks(
        &mut self,
        bucket: NaiveDateTime,
        tick_period: Period,
    ) -> Result<(), TradetermError> {
        let period = self.config.period;
        let coarse = match self.bars.last() {
            Some(bar) if bar.time == bucket => *bar,
            _ => {
                self.ticks.clear();
                return Ok(());
            }
        };

        let path = if tick_period == period {
            bar_path(&coarse).to_vec()
        } else {
            let last_sub = bucket + period.duration() - tick_period.duration();
            let fetch_to = last_sub + span(period, self.config.capacity().saturating_sub(1));
            let subs = self.resolve_range(tick_period, bucket, last_sub, fetch_to)?;
            if subs.is_empty() {
                bar_path(&coarse).to_vec()
            } else {
                price_path(&subs)
            }
        };

        if let Some(forming) = self.bars.last_mut() {
            self.ticks.start(forming, path);
        }
        Ok(())
    }

    /// Backfill the cache for `[from, to]` one window at a time.
    ///
    /// Returns the number of cached bars in the range afterwards.
    pub fn warm(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<usize, TradetermError> {
        let period = self.config.period;
        let reach = span(period, self.config.capacity().max(1) - 1);
        let last = period.floor(to);
        let mut window_from = period.floor(from);
        let mut total = 0;

        while window_from <= last {
            let window_end = (window_from + reach).min(last);
            let bars = self.resolve_range(period, window_from, window_end, window_end + reach)?;
            total += bars.len();
            window_from = window_end + period.duration();
        }
        Ok(total)
    }

    fn check_series(&self, period: Period, bars: &[Bar]) -> Result<(), TradetermError> {
        validate_series(period, bars).map_err(|reason| TradetermError::BarSeries {
            instrument: self.config.instrument.clone(),
            period: period.to_string(),
            reason,
        })
    }

    /// Bars remaining in the synthetic tick buffer.
    pub fn pending_ticks(&self) -> usize {
        self.ticks.remaining()
    }
}

impl std::fmt::Debug for CandleFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleFeed")
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("bars", &self.bars.len())
            .field("pending_ticks", &self.ticks.remaining())
            .finish()
    }
}
