//! Average Directional Index (Wilder).
//!
//! +DM = high - prev high when it exceeds prev low - low and is positive,
//! -DM the mirror. TR, +DM and -DM are summed over the first n moves and then
//! Wilder-smoothed: S = S - S/n + x. DX = 100 * |+DI - -DI| / (+DI + -DI).
//! ADX seeds as the mean of the first n DX values, then (prev * (n-1) + DX) / n.
//! Warmup: first (2n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Bar;

fn directional_movement(bar: &Bar, prev: &Bar) -> (f64, f64) {
    let up = bar.high - prev.high;
    let down = prev.low - bar.low;
    let plus = if up > down && up > 0.0 { up } else { 0.0 };
    let minus = if down > up && down > 0.0 { down } else { 0.0 };
    (plus, minus)
}

fn directional_index(tr: f64, plus: f64, minus: f64) -> f64 {
    if tr == 0.0 {
        return 0.0;
    }
    let pdi = 100.0 * plus / tr;
    let mdi = 100.0 * minus / tr;
    if pdi + mdi == 0.0 {
        0.0
    } else {
        100.0 * (pdi - mdi).abs() / (pdi + mdi)
    }
}

pub fn calculate_adx(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Adx(period));
    }

    let n = period as f64;
    let mut points = Vec::with_capacity(bars.len());
    let (mut tr_s, mut plus_s, mut minus_s) = (0.0, 0.0, 0.0);
    let mut dx_sum = 0.0;
    let mut adx = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            points.push(IndicatorPoint::warmup(bar.time));
            continue;
        }
        let prev = &bars[i - 1];
        let (plus, minus) = directional_movement(bar, prev);
        let tr = bar.true_range(prev.close);

        if i <= period {
            tr_s += tr;
            plus_s += plus;
            minus_s += minus;
        } else {
            tr_s = tr_s - tr_s / n + tr;
            plus_s = plus_s - plus_s / n + plus;
            minus_s = minus_s - minus_s / n + minus;
        }
        if i < period {
            points.push(IndicatorPoint::warmup(bar.time));
            continue;
        }

        let dx = directional_index(tr_s, plus_s, minus_s);
        let count = i - period + 1;
        if count < period {
            dx_sum += dx;
            points.push(IndicatorPoint::warmup(bar.time));
        } else if count == period {
            adx = (dx_sum + dx) / n;
            points.push(IndicatorPoint::valid(bar.time, adx));
        } else {
            adx = (adx * (n - 1.0) + dx) / n;
            points.push(IndicatorPoint::valid(bar.time, adx));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Adx(period),
        points,
    }
}
