//! Population standard deviation of the last n closes.
//!
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

/// (mean, population stddev) of `bars[i+1-n..=i]` closes.
pub(crate) fn window_stats(bars: &[Bar], i: usize, n: usize) -> (f64, f64) {
    let window = &bars[i + 1 - n..=i];
    let mean = window.iter().map(|b| b.close).sum::<f64>() / n as f64;
    let variance = window
        .iter()
        .map(|b| (b.close - mean).powi(2))
        .sum::<f64>()
        / n as f64;
    (mean, variance.sqrt())
}

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                IndicatorPoint::warmup(bar.time)
            } else {
                IndicatorPoint::valid(bar.time, window_stats(bars, i, period).1)
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        points,
    }
}
