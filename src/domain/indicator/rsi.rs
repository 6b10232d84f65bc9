//! Relative Strength Index with Wilder smoothing.
//!
//! The first average gain/loss is the mean over the first n changes; after
//! that avg = (prev_avg * (n-1) + current) / n.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), or 100 when avg_loss is 0.
//! Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

fn rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let mut points: Vec<IndicatorPoint> = bars
        .iter()
        .map(|b| IndicatorPoint::warmup(b.time))
        .collect();
    if period == 0 || bars.len() <= period {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            points,
        };
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i <= period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }

        if i >= period {
            points[i] = IndicatorPoint::valid(bars[i].time, rsi(avg_gain, avg_loss));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        points,
    }
}
