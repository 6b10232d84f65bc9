//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low, TR[i] = true range against the previous close.
//! Seed is the mean of the first n TRs, then ATR = (prev * (n-1) + TR) / n.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let mut points = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = match i {
            0 => bar.high - bar.low,
            _ => bar.true_range(bars[i - 1].close),
        };

        if i + 1 < period {
            atr += tr;
            points.push(IndicatorPoint::warmup(bar.time));
        } else if i + 1 == period {
            atr = (atr + tr) / period as f64;
            points.push(IndicatorPoint::valid(bar.time, atr));
        } else {
            atr = (atr * (period - 1) as f64 + tr) / period as f64;
            points.push(IndicatorPoint::valid(bar.time, atr));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::t;
    use approx::assert_relative_eq;

    fn bar(i: usize, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            time: t(i),
            open: close,
            high,
            low,
            close,
        }
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = vec![
            bar(0, 110.0, 100.0, 105.0),
            bar(1, 115.0, 105.0, 110.0),
            bar(2, 120.0, 110.0, 115.0),
        ];
        let series = calculate_atr(&bars, 3);
        assert!(!series.points[1].valid);
        assert_relative_eq!(series.points[2].value, 10.0);
    }

    #[test]
    fn atr_wilder_smoothing_with_gap() {
        let bars = vec![
            bar(0, 110.0, 100.0, 105.0),
            bar(1, 115.0, 105.0, 110.0),
            bar(2, 140.0, 130.0, 135.0),
        ];
        let series = calculate_atr(&bars, 2);
        // seed (10 + 10) / 2, then gap TR = 140 - 110 = 30
        assert_relative_eq!(series.points[1].value, 10.0);
        assert_relative_eq!(series.points[2].value, (10.0 + 30.0) / 2.0);
    }
}
