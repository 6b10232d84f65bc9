//! SQLite bar cache.
//!
//! One row per (currency_pair, period, time). Times are stored as
//! `YYYY-MM-DD HH:MM:SS` text, which sorts chronologically.

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::Bar;
use crate::domain::period::Period;
use crate::ports::bar_cache_port::{BarCache, CachedRange};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TradetermError {
    TradetermError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> TradetermError {
    TradetermError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_time(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_time(raw: &str) -> Result<NaiveDateTime, TradetermError> {
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT).map_err(|e| TradetermError::Database {
        reason: format!("bad stored time {raw:?}: {e}"),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradetermError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_count("sqlite", "pool_size", 4)?.max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::debug!(path = %db_path, pool_size, "bar cache opened");
        Ok(adapter)
    }

    /// Single-connection in-memory cache. Every pooled connection to
    /// `:memory:` would be a separate database.
    pub fn in_memory() -> Result<Self, TradetermError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TradetermError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), TradetermError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS candle_ohlc (
                    currency_pair TEXT NOT NULL,
                    period TEXT NOT NULL,
                    time TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    PRIMARY KEY (currency_pair, period, time)
                );",
            )
            .map_err(query_error)
    }
}

impl BarCache for SqliteAdapter {
    fn query(
        &self,
        instrument: &str,
        period: Period,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Bar>, TradetermError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT time, open, high, low, close
                 FROM candle_ohlc
                 WHERE currency_pair = ?1 AND period = ?2 AND time >= ?3 AND time <= ?4
                 ORDER BY time ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![instrument, period.as_str(), format_time(from), format_time(to)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (time, open, high, low, close) = row.map_err(query_error)?;
            bars.push(Bar {
                time: parse_time(&time)?,
                open,
                high,
                low,
                close,
            });
        }
        Ok(bars)
    }

    fn upsert(
        &self,
        instrument: &str,
        period: Period,
        bars: &[Bar],
    ) -> Result<usize, TradetermError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO candle_ohlc
                     (currency_pair, period, time, open, high, low, close)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(query_error)?;
            for bar in bars {
                stmt.execute(params![
                    instrument,
                    period.as_str(),
                    format_time(bar.time),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close
                ])
                .map_err(query_error)?;
            }
        }
        tx.commit().map_err(query_error)?;
        Ok(bars.len())
    }

    fn count(&self, instrument: &str, period: Period) -> Result<usize, TradetermError> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM candle_ohlc WHERE currency_pair = ?1 AND period = ?2",
                params![instrument, period.as_str()],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        Ok(count as usize)
    }

    fn ranges(&self) -> Result<Vec<CachedRange>, TradetermError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT currency_pair, period, MIN(time), MAX(time), COUNT(*)
                 FROM candle_ohlc
                 GROUP BY currency_pair, period
                 ORDER BY currency_pair, period",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(query_error)?;

        let mut ranges = Vec::new();
        for row in rows {
            let (instrument, period, first, last, count) = row.map_err(query_error)?;
            let period = match period.parse::<Period>() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(instrument = %instrument, error = %e, "skipping unknown period in cache");
                    continue;
                }
            };
            ranges.push(CachedRange {
                instrument,
                period,
                first: parse_time(&first)?,
                last: parse_time(&last)?,
                bars: count as usize,
            });
        }
        ranges.sort_by(|a, b| (&a.instrument, a.period).cmp(&(&b.instrument, b.period)));
        Ok(ranges)
    }
}
