//! Domain error types.

use crate::domain::position::PositionState;

/// Rejected lifecycle transition on a single position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("cannot {action} position {id}: it is {state}")]
    InvalidTransition {
        id: usize,
        action: &'static str,
        state: PositionState,
    },

    #[error("no position with id {0}")]
    NotFound(usize),
}

/// A journal record that does not describe a valid position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JournalError {
    #[error("record {index}: invalid state flags (opened={opened}, closed={closed}, canceled={canceled})")]
    InvalidFlags {
        index: usize,
        opened: bool,
        closed: bool,
        canceled: bool,
    },

    #[error("record {index}: invalid {field}: {reason}")]
    InvalidField {
        index: usize,
        field: &'static str,
        reason: String,
    },

    #[error("record {index}: missing {field} for a {state} position")]
    MissingField {
        index: usize,
        field: &'static str,
        state: PositionState,
    },

    #[error("record {index}: currency pair {found} does not match repository {expected}")]
    InstrumentMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("journal decode error: {0}")]
    Decode(String),
}

/// Top-level error type for tradeterm.
#[derive(Debug, thiserror::Error)]
pub enum TradetermError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("remote source error: {reason}")]
    Remote { reason: String },

    #[error("unusable remote response: {reason}")]
    RemoteResponse { reason: String },

    #[error("remote source failed after {attempts} attempts: {reason}")]
    RemoteExhausted { attempts: u32, reason: String },

    #[error("bar series violation for {instrument} {period}: {reason}")]
    BarSeries {
        instrument: String,
        period: String,
        reason: String,
    },

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradetermError> for std::process::ExitCode {
    fn from(err: &TradetermError) -> Self {
        let code: u8 = match err {
            TradetermError::Io(_) => 1,
            TradetermError::ConfigParse { .. }
            | TradetermError::ConfigMissing { .. }
            | TradetermError::ConfigInvalid { .. } => 2,
            TradetermError::Database { .. } | TradetermError::DatabaseQuery { .. } => 3,
            TradetermError::Remote { .. }
            | TradetermError::RemoteResponse { .. }
            | TradetermError::RemoteExhausted { .. } => 4,
            TradetermError::BarSeries { .. } => 5,
            TradetermError::Position(_) | TradetermError::Journal(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
