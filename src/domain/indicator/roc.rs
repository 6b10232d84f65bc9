//! Rate of Change.
//!
//! ROC(n)[i] = (C[i] - C[i-n]) / C[i-n] * 100, or 0 when C[i-n] is 0.
//! Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_roc(bars: &[Bar], period: usize) -> IndicatorSeries {
    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period || period == 0 {
                return IndicatorPoint::warmup(bar.time);
            }
            let prev = bars[i - period].close;
            let roc = if prev == 0.0 {
                0.0
            } else {
                (bar.close - prev) / prev * 100.0
            };
            IndicatorPoint::valid(bar.time, roc)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        points,
    }
}
