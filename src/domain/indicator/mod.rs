//! Technical indicators over the feed window.
//!
//! The math lives in one file per indicator and works on plain bar slices.
//! [`Indicator`] is the feed-facing node: it subscribes to the feed's updated
//! event and recomputes its series from the current window on every advance.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

pub use ema::calculate_ema;
pub use sma::calculate_sma;

use crate::domain::event::HandlerId;
use crate::domain::feed::CandleFeed;
use crate::domain::ohlcv::{AppliedPrice, Bar};
use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub time: NaiveDateTime,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub(crate) fn valid(time: NaiveDateTime, value: f64) -> Self {
        IndicatorPoint {
            time,
            valid: true,
            value,
        }
    }

    pub(crate) fn warmup(time: NaiveDateTime) -> Self {
        IndicatorPoint {
            time,
            valid: false,
            value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Wma(usize),
    Rsi(usize),
    Roc(usize),
    Atr(usize),
    Adx(usize),
    Stddev(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
        band: Band,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
        line: MacdLine,
    },
}

impl IndicatorType {
    /// Bars consumed before the first valid point.
    pub fn warmup(&self) -> usize {
        match self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Wma(n)
            | IndicatorType::Atr(n)
            | IndicatorType::Stddev(n)
            | IndicatorType::Bollinger { period: n, .. } => n.saturating_sub(1),
            IndicatorType::Rsi(n) | IndicatorType::Roc(n) => *n,
            IndicatorType::Adx(n) => (2 * n).saturating_sub(1),
            IndicatorType::Macd { slow, signal, .. } => {
                slow.saturating_sub(1) + signal.saturating_sub(1)
            }
        }
    }
}

impl IndicatorType {
    /// Range indicators read high, low and close together.
    pub fn uses_applied_price(&self) -> bool {
        !matches!(self, IndicatorType::Atr(_) | IndicatorType::Adx(_))
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(n) => write!(f, "SMA({})", n),
            IndicatorType::Ema(n) => write!(f, "EMA({})", n),
            IndicatorType::Wma(n) => write!(f, "WMA({})", n),
            IndicatorType::Rsi(n) => write!(f, "RSI({})", n),
            IndicatorType::Roc(n) => write!(f, "ROC({})", n),
            IndicatorType::Atr(n) => write!(f, "ATR({})", n),
            IndicatorType::Adx(n) => write!(f, "ADX({})", n),
            IndicatorType::Stddev(n) => write!(f, "STDDEV({})", n),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
                band,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                let band = match band {
                    Band::Upper => "upper",
                    Band::Middle => "middle",
                    Band::Lower => "lower",
                };
                write!(f, "BBANDS({},{},{})", period, mult, band)
            }
            IndicatorType::Macd {
                fast,
                slow,
                signal,
                line,
            } => {
                let line = match line {
                    MacdLine::Macd => "macd",
                    MacdLine::Signal => "signal",
                    MacdLine::Histogram => "hist",
                };
                write!(f, "MACD({},{},{},{})", fast, slow, signal, line)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values with warmup points as NaN.
    pub fn values(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| if p.valid { p.value } else { f64::NAN })
            .collect()
    }

    pub fn last_valid(&self) -> Option<f64> {
        self.points.last().filter(|p| p.valid).map(|p| p.value)
    }

    fn tail(mut self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        self.points.drain(..start);
        self
    }
}

pub fn calculate(kind: &IndicatorType, bars: &[Bar]) -> IndicatorSeries {
    match *kind {
        IndicatorType::Sma(n) => sma::calculate_sma(bars, n),
        IndicatorType::Ema(n) => ema::calculate_ema(bars, n),
        IndicatorType::Wma(n) => wma::calculate_wma(bars, n),
        IndicatorType::Rsi(n) => rsi::calculate_rsi(bars, n),
        IndicatorType::Roc(n) => roc::calculate_roc(bars, n),
        IndicatorType::Atr(n) => atr::calculate_atr(bars, n),
        IndicatorType::Adx(n) => adx::calculate_adx(bars, n),
        IndicatorType::Stddev(n) => stddev::calculate_stddev(bars, n),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
            band,
        } => bollinger::calculate_bollinger(bars, period, stddev_mult_x100, band),
        IndicatorType::Macd {
            fast,
            slow,
            signal,
            line,
        } => macd::calculate_macd(bars, fast, slow, signal, line),
    }
}

/// Like [`calculate`], but single-series indicators read `applied` instead of
/// the close.
pub fn calculate_applied(kind: &IndicatorType, bars: &[Bar], applied: AppliedPrice) -> IndicatorSeries {
    if applied == AppliedPrice::Close || !kind.uses_applied_price() {
        return calculate(kind, bars);
    }
    let projected: Vec<Bar> = bars
        .iter()
        .map(|bar| Bar {
            close: bar.price(applied),
            ..*bar
        })
        .collect();
    calculate(kind, &projected)
}

/// Recompute `kind` over the feed window, keeping the last `bar_count` points.
fn evaluate(
    kind: &IndicatorType,
    applied: AppliedPrice,
    feed: &CandleFeed,
    bar_count: usize,
) -> IndicatorSeries {
    let needed = bar_count + kind.warmup();
    let extra = needed.saturating_sub(feed.config().window);
    let bars = feed.get_bars(extra).to_vec();
    calculate_applied(kind, &bars, applied).tail(bar_count)
}

/// An indicator kept current by the feed it is attached to.
#[derive(Debug)]
pub struct Indicator {
    kind: IndicatorType,
    applied: AppliedPrice,
    bar_count: usize,
    series: Rc<RefCell<IndicatorSeries>>,
    handler: HandlerId,
}

impl Indicator {
    pub fn attach(feed: &CandleFeed, kind: IndicatorType, bar_count: usize) -> Indicator {
        Indicator::attach_applied(feed, kind, AppliedPrice::Close, bar_count)
    }

    pub fn attach_applied(
        feed: &CandleFeed,
        kind: IndicatorType,
        applied: AppliedPrice,
        bar_count: usize,
    ) -> Indicator {
        let series = Rc::new(RefCell::new(evaluate(&kind, applied, feed, bar_count)));

        let shared = Rc::clone(&series);
        let handler_kind = kind.clone();
        let handler = feed.on_updated().listen(move |feed| {
            *shared.borrow_mut() = evaluate(&handler_kind, applied, feed, bar_count);
        });

        Indicator {
            kind,
            applied,
            bar_count,
            series,
            handler,
        }
    }

    /// Stop following `feed`. The last computed series stays readable.
    pub fn detach(&self, feed: &CandleFeed) -> bool {
        feed.on_updated().unsubscribe(self.handler)
    }

    pub fn kind(&self) -> &IndicatorType {
        &self.kind
    }

    pub fn applied(&self) -> AppliedPrice {
        self.applied
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn times(&self) -> Vec<NaiveDateTime> {
        self.series.borrow().points.iter().map(|p| p.time).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.series.borrow().values()
    }

    pub fn last(&self) -> Option<f64> {
        self.series.borrow().last_valid()
    }

    /// The last `n` values, oldest first. Shorter if fewer are computed.
    pub fn recent(&self, n: usize) -> Vec<f64> {
        let values = self.prices();
        let start = values.len().saturating_sub(n);
        values[start..].to_vec()
    }

    pub fn series(&self) -> IndicatorSeries {
        self.series.borrow().clone()
    }
}
