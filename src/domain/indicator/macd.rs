//! MACD.
//!
//! MACD line = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line,
//! histogram = MACD - signal. One line is emitted per series.
//! Warmup: (slow - 1) + (signal - 1) bars.

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, MacdLine};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[Bar],
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal,
        line,
    };
    if fast == 0 || slow == 0 || signal == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let macd: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // The signal EMA only starts once the MACD line is defined.
    let first_macd = macd.iter().position(Option::is_some).unwrap_or(macd.len());
    let defined: Vec<f64> = macd[first_macd..].iter().flatten().copied().collect();
    let mut signal_line = vec![None; first_macd];
    signal_line.extend(ema_values(&defined, signal));

    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (macd[i], signal_line[i]) {
            (Some(m), Some(s)) => {
                let value = match line {
                    MacdLine::Macd => m,
                    MacdLine::Signal => s,
                    MacdLine::Histogram => m - s,
                };
                IndicatorPoint::valid(bar.time, value)
            }
            _ => IndicatorPoint::warmup(bar.time),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        points,
    }
}
