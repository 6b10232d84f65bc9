//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "http")]
pub mod http_source_adapter;
pub mod json_journal_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
pub mod system_clock;
