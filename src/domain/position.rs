//! One trade lifecycle: pending, then opened or canceled, then closed.
//!
//! `open` and `close` fire a negotiation event before committing. Handlers
//! on `opening` may rewrite the execution price and amount or cancel the
//! open; handlers on `closing` may rewrite the execution price. The committed
//! transition is then announced on `opened`, `canceled` or `closed`.

use crate::domain::error::PositionError;
use crate::domain::event::Event;
use crate::domain::period::Period;
use chrono::NaiveDateTime;
use std::fmt;
use std::ops::Deref;

/// Index of a position inside its repository.
pub type PositionId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Order action that opens this side.
    pub fn as_action(self) -> &'static str {
        match self {
            Side::Long => "buy",
            Side::Short => "sell",
        }
    }

    pub fn from_action(action: &str) -> Option<Side> {
        match action {
            "buy" => Some(Side::Long),
            "sell" => Some(Side::Short),
            _ => None,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionState {
    Pending,
    Opened,
    Canceled,
    Closed,
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionState::Pending => "pending",
            PositionState::Opened => "opened",
            PositionState::Canceled => "canceled",
            PositionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Every recorded field of a position. Requested values are kept alongside
/// the executed ones negotiated through the events.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDetails {
    pub instrument: String,
    pub period: Period,
    pub state: PositionState,
    pub side: Option<Side>,
    pub open_time: Option<NaiveDateTime>,
    pub open_price: Option<f64>,
    pub order_amount: f64,
    pub open_comment: String,
    pub stop_price: Option<f64>,
    pub limit_price: Option<f64>,
    pub exec_open_price: Option<f64>,
    pub exec_order_amount: Option<f64>,
    pub close_time: Option<NaiveDateTime>,
    pub close_price: Option<f64>,
    pub close_comment: String,
    pub exec_close_price: Option<f64>,
}

impl PositionDetails {
    pub fn new(instrument: impl Into<String>, period: Period) -> Self {
        PositionDetails {
            instrument: instrument.into(),
            period,
            state: PositionState::Pending,
            side: None,
            open_time: None,
            open_price: None,
            order_amount: 0.0,
            open_comment: String::new(),
            stop_price: None,
            limit_price: None,
            exec_open_price: None,
            exec_order_amount: None,
            close_time: None,
            close_price: None,
            close_comment: String::new(),
            exec_close_price: None,
        }
    }

    pub fn is_opened(&self) -> bool {
        matches!(self.state, PositionState::Opened | PositionState::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.state == PositionState::Closed
    }

    pub fn is_canceled(&self) -> bool {
        self.state == PositionState::Canceled
    }

    /// Opened and not yet closed.
    pub fn is_open(&self) -> bool {
        self.state == PositionState::Opened
    }

    /// Per-unit realized profit. Zero until closed.
    pub fn profit(&self) -> f64 {
        match (self.state, self.side, self.exec_open_price, self.exec_close_price) {
            (PositionState::Closed, Some(side), Some(open), Some(close)) => {
                side.sign() * (close - open)
            }
            _ => 0.0,
        }
    }

    /// Bars elapsed since open, up to the close or `now`.
    pub fn hold_period(&self, now: NaiveDateTime) -> usize {
        if !self.is_opened() {
            return 0;
        }
        match self.open_time {
            Some(open) => self.period.bars_between(open, self.close_time.unwrap_or(now)),
            None => 0,
        }
    }

    /// Whether `price` breaches the stop. Always false without a stop.
    pub fn should_stop(&self, price: f64) -> bool {
        match (self.side, self.stop_price) {
            (Some(Side::Long), Some(stop)) => price <= stop,
            (Some(Side::Short), Some(stop)) => price >= stop,
            _ => false,
        }
    }

    /// Whether `price` reaches the limit. Always false without a limit.
    pub fn should_take_profit(&self, price: f64) -> bool {
        match (self.side, self.limit_price) {
            (Some(Side::Long), Some(limit)) => price >= limit,
            (Some(Side::Short), Some(limit)) => price <= limit,
            _ => false,
        }
    }

    /// Side of the order that closes this position, once opened.
    pub fn close_side(&self) -> Option<Side> {
        if self.is_opened() {
            self.side.map(Side::opposite)
        } else {
            None
        }
    }
}

/// Argument of every position event.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEvent {
    /// Set when the event was relayed through a repository.
    pub repository: Option<crate::domain::repository::RepositoryId>,
    pub id: PositionId,
    pub position: PositionDetails,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningResult {
    pub exec_price: f64,
    pub exec_amount: f64,
    pub cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosingResult {
    pub exec_price: f64,
}

#[derive(Debug, Default)]
pub struct PositionEvents {
    pub opening: Event<PositionEvent, OpeningResult>,
    pub closing: Event<PositionEvent, ClosingResult>,
    pub opened: Event<PositionEvent>,
    pub closed: Event<PositionEvent>,
    pub canceled: Event<PositionEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub time: NaiveDateTime,
    pub side: Side,
    pub price: f64,
    pub amount: f64,
    pub comment: String,
    pub stop: Option<f64>,
    pub limit: Option<f64>,
}

impl OpenRequest {
    pub fn new(time: NaiveDateTime, side: Side, price: f64, amount: f64) -> Self {
        OpenRequest {
            time,
            side,
            price,
            amount,
            comment: String::new(),
            stop: None,
            limit: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn stop(mut self, price: f64) -> Self {
        self.stop = Some(price);
        self
    }

    pub fn limit(mut self, price: f64) -> Self {
        self.limit = Some(price);
        self
    }
}

#[derive(Debug)]
pub struct Position {
    id: PositionId,
    details: PositionDetails,
    events: PositionEvents,
}

impl Position {
    pub fn new(id: PositionId, details: PositionDetails) -> Self {
        Position {
            id,
            details,
            events: PositionEvents::default(),
        }
    }

    pub fn id(&self) -> PositionId {
        self.id
    }

    pub fn details(&self) -> &PositionDetails {
        &self.details
    }

    pub fn on_opening(&self) -> &Event<PositionEvent, OpeningResult> {
        &self.events.opening
    }

    pub fn on_closing(&self) -> &Event<PositionEvent, ClosingResult> {
        &self.events.closing
    }

    pub fn on_opened(&self) -> &Event<PositionEvent> {
        &self.events.opened
    }

    pub fn on_closed(&self) -> &Event<PositionEvent> {
        &self.events.closed
    }

    pub fn on_canceled(&self) -> &Event<PositionEvent> {
        &self.events.canceled
    }

    fn snapshot(&self) -> PositionEvent {
        PositionEvent {
            repository: None,
            id: self.id,
            position: self.details.clone(),
        }
    }

    fn reject(&self, action: &'static str) -> PositionError {
        PositionError::InvalidTransition {
            id: self.id,
            action,
            state: self.details.state,
        }
    }

    /// Request an open. Returns the resulting state: `Opened`, or `Canceled`
    /// if an `opening` handler vetoed it.
    pub fn open(&mut self, request: OpenRequest) -> Result<PositionState, PositionError> {
        if self.details.state != PositionState::Pending {
            return Err(self.reject("open"));
        }

        let d = &mut self.details;
        d.side = Some(request.side);
        d.open_time = Some(request.time);
        d.open_price = Some(request.price);
        d.order_amount = request.amount;
        d.open_comment = request.comment;
        d.stop_price = request.stop;
        d.limit_price = request.limit;

        let seed = OpeningResult {
            exec_price: request.price,
            exec_amount: request.amount,
            cancel: false,
        };
        let result = self.events.opening.fire(&self.snapshot(), seed);

        if result.cancel {
            self.details.state = PositionState::Canceled;
            tracing::info!(
                id = self.id,
                instrument = %self.details.instrument,
                side = %request.side,
                price = request.price,
                "position canceled"
            );
            self.events.canceled.notify(&self.snapshot());
            return Ok(PositionState::Canceled);
        }

        self.details.exec_open_price = Some(result.exec_price);
        self.details.exec_order_amount = Some(result.exec_amount);
        self.details.state = PositionState::Opened;
        tracing::info!(
            id = self.id,
            instrument = %self.details.instrument,
            side = %request.side,
            price = result.exec_price,
            amount = result.exec_amount,
            "position opened"
        );
        self.events.opened.notify(&self.snapshot());
        Ok(PositionState::Opened)
    }

    /// Close an opened position. Returns the executed close price.
    pub fn close(
        &mut self,
        time: NaiveDateTime,
        price: f64,
        comment: impl Into<String>,
    ) -> Result<f64, PositionError> {
        if self.details.state != PositionState::Opened {
            return Err(self.reject("close"));
        }

        self.details.close_time = Some(time);
        self.details.close_price = Some(price);
        self.details.close_comment = comment.into();

        let result = self
            .events
            .closing
            .fire(&self.snapshot(), ClosingResult { exec_price: price });

        self.details.exec_close_price = Some(result.exec_price);
        self.details.state = PositionState::Closed;
        tracing::info!(
            id = self.id,
            instrument = %self.details.instrument,
            price = result.exec_price,
            profit = self.details.profit(),
            "position closed"
        );
        self.events.closed.notify(&self.snapshot());
        Ok(result.exec_price)
    }
}

impl Deref for Position {
    type Target = PositionDetails;

    fn deref(&self) -> &PositionDetails {
        &self.details
    }
}
