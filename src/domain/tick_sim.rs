//! Synthetic intra-bar price paths for backtests.
//!
//! A bar that closed at or above its open is assumed to have traded
//! open, low, high, close; a bar that closed lower traded open, high, low,
//! close. This is a heuristic, not a reconstruction of real ticks.

use crate::domain::ohlcv::Bar;
use std::collections::VecDeque;

pub fn bar_path(bar: &Bar) -> [f64; 4] {
    if bar.is_up() {
        [bar.open, bar.low, bar.high, bar.close]
    } else {
        [bar.open, bar.high, bar.low, bar.close]
    }
}

/// Concatenated paths of consecutive sub-bars.
pub fn price_path(bars: &[Bar]) -> Vec<f64> {
    bars.iter().flat_map(bar_path).collect()
}

/// Replays a price path into the forming bar one price at a time.
#[derive(Debug, Default)]
pub struct TickPlayer {
    pending: VecDeque<f64>,
}

impl TickPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace any remaining prices with `path` and reset `forming` to its
    /// first price. The first price is consumed by the reset.
    pub fn start(&mut self, forming: &mut Bar, path: Vec<f64>) {
        self.pending = path.into();
        if let Some(first) = self.pending.pop_front() {
            forming.open = first;
            forming.high = first;
            forming.low = first;
            forming.close = first;
        }
    }

    /// Apply the next price to `forming`. Returns false once drained.
    pub fn step(&mut self, forming: &mut Bar) -> bool {
        match self.pending.pop_front() {
            Some(price) => {
                forming.apply_tick(price);
                true
            }
            None => false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
