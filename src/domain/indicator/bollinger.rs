//! Bollinger Bands.
//!
//! Middle is SMA(n); upper and lower are middle +/- mult * population
//! stddev over the same n closes. One band is emitted per series.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::stddev::window_stats;
use crate::domain::indicator::{Band, IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_bollinger(
    bars: &[Bar],
    period: usize,
    stddev_mult_x100: u32,
    band: Band,
) -> IndicatorSeries {
    let mult = stddev_mult_x100 as f64 / 100.0;
    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                return IndicatorPoint::warmup(bar.time);
            }
            let (middle, sd) = window_stats(bars, i, period);
            let value = match band {
                Band::Upper => middle + mult * sd,
                Band::Middle => middle,
                Band::Lower => middle - mult * sd,
            };
            IndicatorPoint::valid(bar.time, value)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
            band,
        },
        points,
    }
}
