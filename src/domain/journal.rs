//! Flat journal layout of a position and its conversion to and from
//! [`PositionDetails`].

use crate::domain::error::JournalError;
use crate::domain::period::Period;
use crate::domain::position::{PositionDetails, PositionState, Side};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub is_opened: bool,
    pub is_closed: bool,
    pub is_canceled: bool,
    pub currency_pair: String,
    pub open_time: Option<String>,
    pub open_action: String,
    pub open_price: Option<f64>,
    pub open_comment: String,
    pub close_time: Option<String>,
    pub close_price: Option<f64>,
    pub close_comment: String,
    pub order_amount: f64,
    pub stop_price: Option<f64>,
    pub limit_price: Option<f64>,
    pub exec_open_price: Option<f64>,
    pub exec_close_price: Option<f64>,
    pub exec_order_amount: Option<f64>,
    /// Derived on save, ignored on load.
    pub profit: f64,
}

fn format_time(time: Option<NaiveDateTime>) -> Option<String> {
    time.map(|t| t.format(TIME_FORMAT).to_string())
}

fn parse_time(
    index: usize,
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<NaiveDateTime>, JournalError> {
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(s, TIME_FORMAT)
            .map(Some)
            .map_err(|e| JournalError::InvalidField {
                index,
                field,
                reason: format!("{s:?}: {e}"),
            }),
    }
}

fn state_from_flags(
    index: usize,
    opened: bool,
    closed: bool,
    canceled: bool,
) -> Result<PositionState, JournalError> {
    match (opened, closed, canceled) {
        (false, false, false) => Ok(PositionState::Pending),
        (true, false, false) => Ok(PositionState::Opened),
        (false, false, true) => Ok(PositionState::Canceled),
        (true, true, false) => Ok(PositionState::Closed),
        _ => Err(JournalError::InvalidFlags {
            index,
            opened,
            closed,
            canceled,
        }),
    }
}

fn require<T: Copy>(
    index: usize,
    field: &'static str,
    state: PositionState,
    value: Option<T>,
) -> Result<T, JournalError> {
    value.ok_or(JournalError::MissingField {
        index,
        field,
        state,
    })
}

impl PositionRecord {
    pub fn from_details(details: &PositionDetails) -> Self {
        PositionRecord {
            is_opened: details.is_opened(),
            is_closed: details.is_closed(),
            is_canceled: details.is_canceled(),
            currency_pair: details.instrument.clone(),
            open_time: format_time(details.open_time),
            open_action: details
                .side
                .map(Side::as_action)
                .unwrap_or_default()
                .to_string(),
            open_price: details.open_price,
            open_comment: details.open_comment.clone(),
            close_time: format_time(details.close_time),
            close_price: details.close_price,
            close_comment: details.close_comment.clone(),
            order_amount: details.order_amount,
            stop_price: details.stop_price,
            limit_price: details.limit_price,
            exec_open_price: details.exec_open_price,
            exec_close_price: details.exec_close_price,
            exec_order_amount: details.exec_order_amount,
            profit: details.profit(),
        }
    }

    /// Decode record `index` for a repository of `instrument` at `period`.
    pub fn to_details(
        &self,
        index: usize,
        instrument: &str,
        period: Period,
    ) -> Result<PositionDetails, JournalError> {
        if self.currency_pair != instrument {
            return Err(JournalError::InstrumentMismatch {
                index,
                expected: instrument.to_string(),
                found: self.currency_pair.clone(),
            });
        }

        let state = state_from_flags(index, self.is_opened, self.is_closed, self.is_canceled)?;

        let side = match self.open_action.as_str() {
            "" => None,
            action => Some(Side::from_action(action).ok_or_else(|| {
                JournalError::InvalidField {
                    index,
                    field: "open_action",
                    reason: format!("{action:?} is neither buy nor sell"),
                }
            })?),
        };
        let open_time = parse_time(index, "open_time", &self.open_time)?;
        let close_time = parse_time(index, "close_time", &self.close_time)?;

        if matches!(state, PositionState::Opened | PositionState::Closed) {
            require(index, "open_action", state, side)?;
            require(index, "open_time", state, open_time)?;
            require(index, "exec_open_price", state, self.exec_open_price)?;
            require(index, "exec_order_amount", state, self.exec_order_amount)?;
        }
        if state == PositionState::Closed {
            require(index, "close_time", state, close_time)?;
            require(index, "exec_close_price", state, self.exec_close_price)?;
        }

        Ok(PositionDetails {
            instrument: instrument.to_string(),
            period,
            state,
            side,
            open_time,
            open_price: self.open_price,
            order_amount: self.order_amount,
            open_comment: self.open_comment.clone(),
            stop_price: self.stop_price,
            limit_price: self.limit_price,
            exec_open_price: self.exec_open_price,
            exec_order_amount: self.exec_order_amount,
            close_time,
            close_price: self.close_price,
            close_comment: self.close_comment.clone(),
            exec_close_price: self.exec_close_price,
        })
    }
}

/// Decode a whole journal. Any bad record fails the batch.
pub fn decode_all(
    records: &[PositionRecord],
    instrument: &str,
    period: Period,
) -> Result<Vec<PositionDetails>, JournalError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| r.to_details(i, instrument, period))
        .collect()
}
