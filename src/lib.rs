//! tradeterm: candle feed, position lifecycle and trade terminal for a
//! single-exchange crypto trading sandbox.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
