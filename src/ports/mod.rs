//! Port traits the domain depends on.

pub mod bar_cache_port;
pub mod bar_source_port;
pub mod clock_port;
pub mod config_port;
pub mod journal_port;
