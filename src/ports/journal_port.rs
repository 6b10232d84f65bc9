//! Position journal persistence port.

use crate::domain::error::TradetermError;
use crate::domain::journal::PositionRecord;

pub trait JournalPort {
    /// All records in insertion order. A journal that does not exist yet is empty.
    fn load(&self) -> Result<Vec<PositionRecord>, TradetermError>;

    /// Replace the stored journal with `records`.
    fn save(&self, records: &[PositionRecord]) -> Result<(), TradetermError>;
}
