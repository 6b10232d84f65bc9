//! OHLC bars and the window snapshot handed to consumers.

use crate::domain::period::Period;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Which bar field a single-series indicator reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AppliedPrice {
    Open,
    High,
    Low,
    #[default]
    Close,
}

impl fmt::Display for AppliedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppliedPrice::Open => "open",
            AppliedPrice::High => "high",
            AppliedPrice::Low => "low",
            AppliedPrice::Close => "close",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AppliedPrice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(AppliedPrice::Open),
            "high" => Ok(AppliedPrice::High),
            "low" => Ok(AppliedPrice::Low),
            "close" => Ok(AppliedPrice::Close),
            other => Err(format!(
                "unknown applied price: {other} (expected open, high, low or close)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn price(&self, applied: AppliedPrice) -> f64 {
        match applied {
            AppliedPrice::Open => self.open,
            AppliedPrice::High => self.high,
            AppliedPrice::Low => self.low,
            AppliedPrice::Close => self.close,
        }
    }

    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Fold one traded price into a forming bar.
    pub fn apply_tick(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

/// Checks that every bar starts a `period` bucket and that times strictly increase.
///
/// Returns a human-readable reason on the first violation.
pub fn validate_series(period: Period, bars: &[Bar]) -> Result<(), String> {
    let mut prev: Option<NaiveDateTime> = None;
    for bar in bars {
        if !period.is_aligned(bar.time) {
            return Err(format!("bar at {} is not aligned to {}", bar.time, period));
        }
        if let Some(p) = prev {
            if bar.time <= p {
                return Err(format!("bar at {} does not follow {}", bar.time, p));
            }
        }
        prev = Some(bar.time);
    }
    Ok(())
}

/// Column-wise copy of the feed window. Consumers never see the live buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bars {
    pub times: Vec<NaiveDateTime>,
    pub opens: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
}

impl Bars {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut out = Bars {
            times: Vec::with_capacity(bars.len()),
            opens: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            closes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            out.times.push(bar.time);
            out.opens.push(bar.open);
            out.highs.push(bar.high);
            out.lows.push(bar.low);
            out.closes.push(bar.close);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Bar> {
        Some(Bar {
            time: *self.times.get(index)?,
            open: *self.opens.get(index)?,
            high: *self.highs.get(index)?,
            low: *self.lows.get(index)?,
            close: *self.closes.get(index)?,
        })
    }

    pub fn last(&self) -> Option<Bar> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn last_time(&self) -> Option<NaiveDateTime> {
        self.times.last().copied()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// The trailing `n` bars (all of them if fewer are held).
    pub fn tail(&self, n: usize) -> Bars {
        let start = self.len().saturating_sub(n);
        Bars {
            times: self.times[start..].to_vec(),
            opens: self.opens[start..].to_vec(),
            highs: self.highs[start..].to_vec(),
            lows: self.lows[start..].to_vec(),
            closes: self.closes[start..].to_vec(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Vec<Bar> {
        self.iter().collect()
    }
}
