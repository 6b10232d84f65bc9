//! Weighted Moving Average.
//!
//! WMA(n) = (1*P[i-n+1] + 2*P[i-n+2] + ... + n*P[i]) / (n*(n+1)/2),
//! updated in O(1) per bar from the running plain and weighted sums.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_wma(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Wma(period));
    }

    let mut points = Vec::with_capacity(bars.len());
    let divisor = (period * (period + 1)) as f64 / 2.0;
    let mut weighted = 0.0;
    let mut plain = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period {
            weighted += (i + 1) as f64 * bar.close;
            plain += bar.close;
        } else {
            weighted += period as f64 * bar.close - plain;
            plain += bar.close - bars[i - period].close;
        }

        if i + 1 >= period {
            points.push(IndicatorPoint::valid(bar.time, weighted / divisor));
        } else {
            points.push(IndicatorPoint::warmup(bar.time));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Wma(period),
        points,
    }
}
