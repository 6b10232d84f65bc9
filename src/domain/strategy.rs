//! Strategy capability interface and the bundled SMA crossover strategy.
//!
//! A strategy keeps its own state across ticks. Fill negotiation is a
//! separate [`FillPolicy`] object so the terminal can wire it to repository
//! events while the strategy itself is mutably borrowed by `on_tick`.

use crate::domain::error::TradetermError;
use crate::domain::feed::CandleFeed;
use crate::domain::indicator::{Indicator, IndicatorType};
use crate::domain::ohlcv::{AppliedPrice, Bars};
use crate::domain::position::{ClosingResult, OpenRequest, OpeningResult, PositionEvent, Side};
use crate::domain::repository::PositionRepository;
use chrono::NaiveDateTime;
use std::rc::Rc;

pub struct TickContext<'a> {
    pub bars: &'a Bars,
    /// True on the first tick that sees a new last bar.
    pub is_new_bar: bool,
    pub now: NaiveDateTime,
}

/// Decides real fills for requested opens and closes.
pub trait FillPolicy {
    fn on_position_opening(&self, _event: &PositionEvent, requested: OpeningResult) -> OpeningResult {
        requested
    }

    fn on_position_closing(&self, _event: &PositionEvent, requested: ClosingResult) -> ClosingResult {
        requested
    }
}

/// Fills exactly at the requested price and amount.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptRequested;

impl FillPolicy for AcceptRequested {}

/// Fills `amount` worse than requested on every open and close.
#[derive(Debug, Clone, Copy)]
pub struct FixedSlippage {
    pub amount: f64,
}

impl FillPolicy for FixedSlippage {
    fn on_position_opening(&self, event: &PositionEvent, requested: OpeningResult) -> OpeningResult {
        let exec_price = match event.position.side {
            Some(Side::Long) => requested.exec_price + self.amount,
            Some(Side::Short) => requested.exec_price - self.amount,
            None => requested.exec_price,
        };
        OpeningResult {
            exec_price,
            ..requested
        }
    }

    fn on_position_closing(&self, event: &PositionEvent, requested: ClosingResult) -> ClosingResult {
        let exec_price = match event.position.side {
            Some(Side::Long) => requested.exec_price - self.amount,
            Some(Side::Short) => requested.exec_price + self.amount,
            None => requested.exec_price,
        };
        ClosingResult { exec_price }
    }
}

pub trait Strategy {
    fn name(&self) -> &str;

    /// Called once before the first advance. Attach indicators here.
    fn on_init(&mut self, _feed: &CandleFeed) {}

    fn on_tick(
        &mut self,
        ctx: &TickContext<'_>,
        repository: &mut PositionRepository,
    ) -> Result<(), TradetermError>;

    fn fill_policy(&self) -> Rc<dyn FillPolicy> {
        Rc::new(AcceptRequested)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmaCrossConfig {
    pub fast: usize,
    pub slow: usize,
    pub amount: f64,
    pub allow_short: bool,
    /// Percent distance of the stop from the entry; 0 disables.
    pub stop_loss_pct: f64,
    /// Percent distance of the limit from the entry; 0 disables.
    pub take_profit_pct: f64,
    pub slippage: f64,
    /// Bar field both averages are computed over.
    pub price: AppliedPrice,
}

impl Default for SmaCrossConfig {
    fn default() -> Self {
        SmaCrossConfig {
            fast: 5,
            slow: 20,
            amount: 1.0,
            allow_short: false,
            stop_loss_pct: 0.0,
            take_profit_pct: 0.0,
            slippage: 0.0,
            price: AppliedPrice::Close,
        }
    }
}

/// Goes long when the fast SMA crosses above the slow one and, if allowed,
/// short on the opposite cross. A cross closes positions on the other side.
#[derive(Debug)]
pub struct SmaCross {
    config: SmaCrossConfig,
    fast: Option<Indicator>,
    slow: Option<Indicator>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cross {
    Up,
    Down,
}

impl SmaCross {
    pub fn new(config: SmaCrossConfig) -> Self {
        SmaCross {
            config,
            fast: None,
            slow: None,
        }
    }

    pub fn config(&self) -> &SmaCrossConfig {
        &self.config
    }

    fn cross(&self) -> Option<Cross> {
        let fast = self.fast.as_ref()?.recent(2);
        let slow = self.slow.as_ref()?.recent(2);
        if fast.len() < 2 || slow.len() < 2 || fast.iter().chain(&slow).any(|v| v.is_nan()) {
            return None;
        }
        if fast[0] <= slow[0] && fast[1] > slow[1] {
            Some(Cross::Up)
        } else if fast[0] >= slow[0] && fast[1] < slow[1] {
            Some(Cross::Down)
        } else {
            None
        }
    }

    fn entry(&self, now: NaiveDateTime, side: Side, price: f64, comment: &str) -> OpenRequest {
        let mut request = OpenRequest::new(now, side, price, self.config.amount).comment(comment);
        let sign = match side {
            Side::Long => 1.0,
            Side::Short => -1.0,
        };
        if self.config.stop_loss_pct > 0.0 {
            request = request.stop(price * (1.0 - sign * self.config.stop_loss_pct / 100.0));
        }
        if self.config.take_profit_pct > 0.0 {
            request = request.limit(price * (1.0 + sign * self.config.take_profit_pct / 100.0));
        }
        request
    }
}

fn close_side(
    repository: &mut PositionRepository,
    side: Side,
    now: NaiveDateTime,
    price: f64,
    comment: &str,
) -> Result<(), TradetermError> {
    for position in repository.get_open_mut(side) {
        position.close(now, price, comment)?;
    }
    Ok(())
}

impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma_cross"
    }

    fn on_init(&mut self, feed: &CandleFeed) {
        let price = self.config.price;
        self.fast = Some(Indicator::attach_applied(
            feed,
            IndicatorType::Sma(self.config.fast),
            price,
            2,
        ));
        self.slow = Some(Indicator::attach_applied(
            feed,
            IndicatorType::Sma(self.config.slow),
            price,
            2,
        ));
    }

    fn on_tick(
        &mut self,
        ctx: &TickContext<'_>,
        repository: &mut PositionRepository,
    ) -> Result<(), TradetermError> {
        let Some(price) = ctx.bars.last_close() else {
            return Ok(());
        };

        // Protective exits are checked on every tick, entries only on new bars.
        for side in [Side::Long, Side::Short] {
            for position in repository.get_open_mut(side) {
                if position.should_stop(price) {
                    position.close(ctx.now, price, "stop")?;
                } else if position.should_take_profit(price) {
                    position.close(ctx.now, price, "limit")?;
                }
            }
        }

        if !ctx.is_new_bar {
            return Ok(());
        }

        match self.cross() {
            Some(Cross::Up) => {
                close_side(repository, Side::Short, ctx.now, price, "golden cross")?;
                if repository.get_open(Side::Long).is_empty() {
                    let request = self.entry(ctx.now, Side::Long, price, "golden cross");
                    repository.create().open(request)?;
                }
            }
            Some(Cross::Down) => {
                close_side(repository, Side::Long, ctx.now, price, "dead cross")?;
                if self.config.allow_short && repository.get_open(Side::Short).is_empty() {
                    let request = self.entry(ctx.now, Side::Short, price, "dead cross");
                    repository.create().open(request)?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn fill_policy(&self) -> Rc<dyn FillPolicy> {
        if self.config.slippage > 0.0 {
            Rc::new(FixedSlippage {
                amount: self.config.slippage,
            })
        } else {
            Rc::new(AcceptRequested)
        }
    }
}
