//! Remote bar source port.

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use chrono::NaiveDateTime;

/// Supplies historical bars for an instrument, inclusive of both range ends.
///
/// Bars come back ascending by time. Gaps are allowed; the feed rejects
/// duplicate or out-of-order timestamps. Transient failures are reported as
/// [`TradetermError::Remote`] and retried by the caller; anything the remote
/// answered but that cannot be used is [`TradetermError::RemoteResponse`].
pub trait BarSource {
    fn name(&self) -> &str;

    fn fetch(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError>;
}
