//! Simple Moving Average.
//!
//! SMA(n)[i] = mean of the last n closes, kept as a running sum.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Sma(period));
    }

    let mut points = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        sum += bar.close;
        if i >= period {
            sum -= bars[i - period].close;
        }
        if i + 1 >= period {
            points.push(IndicatorPoint::valid(bar.time, sum / period as f64));
        } else {
            points.push(IndicatorPoint::warmup(bar.time));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        points,
    }
}
