//! Configuration validation.
//!
//! Checks every section the binary reads before any cache, remote or journal
//! I/O happens.

use crate::domain::error::TradetermError;
use crate::domain::ohlcv::AppliedPrice;
use crate::domain::period::Period;
use crate::domain::terminal::TradeMode;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const DEFAULT_WINDOW: usize = 100;
pub const DEFAULT_BASE_URL: &str = "https://zaif.jp/zaif_chart_api/v1";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    validate_terminal_config(config)?;
    validate_remote_config(config)?;
    validate_sqlite_config(config)?;
    validate_strategy_config(config)?;
    Ok(())
}

pub fn validate_terminal_config(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    config.require_string("terminal", "instrument")?;
    let period = parse_period(config, "period")?;
    let mode = parse_mode(config)?;

    if config.get_count("terminal", "window", DEFAULT_WINDOW)? == 0 {
        return Err(invalid("terminal", "window", "window must be at least 1"));
    }
    config.get_count("terminal", "lookback", 0)?;
    config.get_count("terminal", "poll_interval_ms", 2000)?;
    config.get_count("terminal", "max_ticks", 0)?;

    if config.get_string("terminal", "tick_period").is_some() {
        let tick_period = parse_period(config, "tick_period")?;
        if tick_period > period || !tick_period.divides(period) {
            return Err(invalid(
                "terminal",
                "tick_period",
                &format!("{tick_period} does not evenly split {period}"),
            ));
        }
    }

    match mode {
        TradeMode::Backtest => {
            let start = require_datetime(config, "terminal", "start")?;
            let end = require_datetime(config, "terminal", "end")?;
            if start >= end {
                return Err(invalid("terminal", "start", "start must be before end"));
            }
        }
        TradeMode::Practice => {
            config.require_string("terminal", "journal")?;
        }
        TradeMode::ForwardTest => {}
    }
    Ok(())
}

pub fn validate_remote_config(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    let source = config
        .get_string("remote", "source")
        .unwrap_or_else(|| "http".to_string());
    match source.trim() {
        "http" => {}
        "csv" => {
            config.require_string("remote", "csv_dir")?;
        }
        other => {
            return Err(invalid(
                "remote",
                "source",
                &format!("unknown source {other:?} (expected http or csv)"),
            ));
        }
    }

    config.get_count("remote", "min_interval_ms", 5000)?;
    config.get_count("remote", "max_retries", 3)?;
    config.get_count("remote", "retry_delay_ms", 1000)?;
    if config.get_count("remote", "timeout_secs", 30)? == 0 {
        return Err(invalid("remote", "timeout_secs", "timeout_secs must be at least 1"));
    }
    Ok(())
}

pub fn validate_sqlite_config(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    if config.get_count("sqlite", "pool_size", 4)? == 0 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "sma_cross".to_string());
    if name.trim() != "sma_cross" {
        return Err(invalid(
            "strategy",
            "name",
            &format!("unknown strategy {:?}", name.trim()),
        ));
    }

    let fast = config.get_count("strategy", "fast", 5)?;
    let slow = config.get_count("strategy", "slow", 20)?;
    if fast == 0 {
        return Err(invalid("strategy", "fast", "fast must be at least 1"));
    }
    if fast >= slow {
        return Err(invalid("strategy", "fast", "fast must be shorter than slow"));
    }

    parse_applied_price(config)?;

    if config.get_double("strategy", "amount", 1.0) <= 0.0 {
        return Err(invalid("strategy", "amount", "amount must be positive"));
    }
    for key in ["stop_loss_pct", "take_profit_pct", "slippage"] {
        if config.get_double("strategy", key, 0.0) < 0.0 {
            return Err(invalid("strategy", key, &format!("{key} must be non-negative")));
        }
    }

    // Two slow-SMA points are needed to see a cross.
    let window = config.get_count("terminal", "window", DEFAULT_WINDOW)?;
    let lookback = config.get_count("terminal", "lookback", 0)?;
    if window + lookback < slow + 1 {
        return Err(invalid(
            "terminal",
            "lookback",
            &format!(
                "window + lookback is {} but the slow average needs {}",
                window + lookback,
                slow + 1
            ),
        ));
    }
    Ok(())
}

/// `YYYY-MM-DD HH:MM:SS`, or a bare date meaning midnight.
pub fn parse_datetime(section: &str, key: &str, raw: &str) -> Result<NaiveDateTime, TradetermError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| {
            invalid(
                section,
                key,
                &format!("invalid {key} {raw:?}, expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS"),
            )
        })
}

pub fn require_datetime(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDateTime, TradetermError> {
    let raw = config.require_string(section, key)?;
    parse_datetime(section, key, &raw)
}

pub fn parse_period(config: &dyn ConfigPort, key: &str) -> Result<Period, TradetermError> {
    let raw = config.require_string("terminal", key)?;
    raw.parse::<Period>()
        .map_err(|e| invalid("terminal", key, &e.to_string()))
}

pub fn parse_mode(config: &dyn ConfigPort) -> Result<TradeMode, TradetermError> {
    match config.get_string("terminal", "mode") {
        None => Ok(TradeMode::Backtest),
        Some(raw) => raw
            .parse::<TradeMode>()
            .map_err(|reason| invalid("terminal", "mode", &reason)),
    }
}

pub fn parse_applied_price(config: &dyn ConfigPort) -> Result<AppliedPrice, TradetermError> {
    match config.get_string("strategy", "price") {
        None => Ok(AppliedPrice::default()),
        Some(raw) => raw
            .parse::<AppliedPrice>()
            .map_err(|reason| invalid("strategy", "price", &reason)),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TradetermError {
    TradetermError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
