//! CSV file bar source for offline replay.
//!
//! Reads `{base_path}/{instrument}_{period}.csv`, e.g. `btc_jpy_1h.csv`, with
//! a `time,open,high,low,close` header and `YYYY-MM-DD HH:MM:SS` times.

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use crate::ports::bar_source_port::BarSource;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::path::PathBuf;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, instrument: &str, period: Period) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", instrument, period))
    }
}

impl BarSource for CsvAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        let path = self.csv_path(instrument, period);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "no csv history for pair");
            return Ok(Vec::new());
        }

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| TradetermError::RemoteResponse {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| TradetermError::RemoteResponse {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let time = NaiveDateTime::parse_from_str(row.time.trim(), TIME_FORMAT).map_err(|e| {
                TradetermError::RemoteResponse {
                    reason: format!("{} row {}: invalid time {:?}: {}", path.display(), line + 1, row.time, e),
                }
            })?;

            if time < from || time > to {
                continue;
            }
            bars.push(Bar {
                time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
        }

        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }
}
