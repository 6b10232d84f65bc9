//! Core domain types and logic.

pub mod error;
pub mod period;
pub mod event;
pub mod ohlcv;
pub mod tick_sim;
pub mod throttle;
pub mod feed;
pub mod indicator;
pub mod position;
pub mod repository;
pub mod journal;
pub mod strategy;
pub mod terminal;
pub mod config_validation;
