//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

/// Raw EMA of an arbitrary value sequence; `None` during warmup.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if period == 0 {
        out.resize(values.len(), None);
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut sum = 0.0;
    let mut ema = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            sum += value;
            out.push(None);
        } else if i + 1 == period {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema = value * k + ema * (1.0 - k);
            out.push(Some(ema));
        }
    }
    out
}

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Ema(period));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let points = bars
        .iter()
        .zip(ema_values(&closes, period))
        .map(|(bar, ema)| match ema {
            Some(v) => IndicatorPoint::valid(bar.time, v),
            None => IndicatorPoint::warmup(bar.time),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        points,
    }
}
