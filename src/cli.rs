//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_journal_adapter::JsonJournalAdapter;
use crate::adapters::system_clock::SystemClock;
use crate::domain::config_validation::{
    parse_applied_price, parse_datetime, parse_mode, parse_period, require_datetime, validate_config,
    validate_remote_config, validate_sqlite_config, DEFAULT_WINDOW,
};
use crate::domain::error::TradetermError;
use crate::domain::feed::{CandleFeed, FeedConfig, FeedMode};
use crate::domain::period::Period;
use crate::domain::strategy::{SmaCross, SmaCrossConfig};
use crate::domain::terminal::{RunSummary, TerminalConfig, TradeMode, TradeTerminal};
use crate::domain::throttle::{ThrottleConfig, ThrottledSource};
use crate::ports::bar_cache_port::BarCache;
use crate::ports::bar_source_port::BarSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::journal_port::JournalPort;

#[derive(Parser, Debug)]
#[command(name = "tradeterm", about = "Candle feed and position terminal for crypto trading")]
pub struct Cli {
    /// Log filter, e.g. `info` or `tradeterm=debug`. RUST_LOG wins.
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trade terminal
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// backtest, forwardtest or practice
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Backfill the bar cache for a range without running a strategy
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Show cached ranges per pair and period
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print a position journal and its total profit
    Positions {
        #[arg(short, long)]
        journal: PathBuf,
        #[arg(long, default_value = "1h")]
        period: String,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let Cli {
        log_level,
        json_logs,
        command,
    } = cli;

    match command {
        Command::Run {
            config,
            mode,
            start,
            end,
            max_ticks,
        } => {
            let mut adapter = match load_config(&config) {
                Ok(a) => a,
                Err(code) => return code,
            };
            init_logging(&adapter, log_level.as_deref(), json_logs);
            for (key, value) in [("mode", mode), ("start", start), ("end", end)] {
                if let Some(value) = value {
                    adapter.set("terminal", key, &value);
                }
            }
            if let Some(max) = max_ticks {
                adapter.set("terminal", "max_ticks", &max.to_string());
            }
            report(run_terminal(&adapter).map(|summary| print_summary(&summary)))
        }
        Command::Fetch { config, start, end } => {
            let adapter = match load_config(&config) {
                Ok(a) => a,
                Err(code) => return code,
            };
            init_logging(&adapter, log_level.as_deref(), json_logs);
            report(run_fetch(&adapter, &start, &end))
        }
        Command::Info { config } => {
            let adapter = match load_config(&config) {
                Ok(a) => a,
                Err(code) => return code,
            };
            init_logging(&adapter, log_level.as_deref(), json_logs);
            report(run_info(&adapter))
        }
        Command::Positions { journal, period } => {
            crate::logging::init(log_level.as_deref().unwrap_or("warn"), json_logs);
            report(run_positions(&journal, &period))
        }
        Command::Validate { config } => {
            let adapter = match load_config(&config) {
                Ok(a) => a,
                Err(code) => return code,
            };
            init_logging(&adapter, log_level.as_deref(), json_logs);
            report(validate_config(&adapter).map(|()| {
                eprintln!("{}: ok", config.display());
            }))
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn init_logging(config: &dyn ConfigPort, level: Option<&str>, json: bool) {
    let level = level
        .map(str::to_string)
        .or_else(|| config.get_string("logging", "level"))
        .unwrap_or_else(|| "info".to_string());
    let json = json || config.get_bool("logging", "json", false);
    crate::logging::init(&level, json);
}

fn report(result: Result<(), TradetermError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn print_summary(summary: &RunSummary) {
    eprintln!("\n=== Run Summary ===");
    eprintln!("Ticks:            {}", summary.ticks);
    eprintln!("Positions:        {}", summary.positions);
    eprintln!("Closed:           {}", summary.closed);
    eprintln!("Canceled:         {}", summary.canceled);
    eprintln!("Total Profit:     {:.4}", summary.total_profit);
}

pub fn build_throttle_config(config: &dyn ConfigPort) -> Result<ThrottleConfig, TradetermError> {
    let defaults = ThrottleConfig::default();
    let millis = |key: &str, default: Duration| -> Result<Duration, TradetermError> {
        let ms = config.get_count("remote", key, default.as_millis() as usize)?;
        Ok(Duration::from_millis(ms as u64))
    };
    Ok(ThrottleConfig {
        min_interval: millis("min_interval_ms", defaults.min_interval)?,
        max_retries: config.get_count("remote", "max_retries", defaults.max_retries as usize)? as u32,
        retry_delay: millis("retry_delay_ms", defaults.retry_delay)?,
    })
}

pub fn build_feed_config(config: &dyn ConfigPort) -> Result<FeedConfig, TradetermError> {
    let mode = match parse_mode(config)? {
        TradeMode::Backtest => FeedMode::Backtest {
            from: require_datetime(config, "terminal", "start")?,
            to: require_datetime(config, "terminal", "end")?,
        },
        TradeMode::ForwardTest | TradeMode::Practice => FeedMode::Live,
    };
    let tick_period = match config.get_string("terminal", "tick_period") {
        Some(_) => Some(parse_period(config, "tick_period")?),
        None => None,
    };
    Ok(FeedConfig {
        instrument: config.require_string("terminal", "instrument")?,
        period: parse_period(config, "period")?,
        window: config.get_count("terminal", "window", DEFAULT_WINDOW)?,
        lookback: config.get_count("terminal", "lookback", 0)?,
        mode,
        tick_period,
    })
}

pub fn build_terminal_config(config: &dyn ConfigPort) -> Result<TerminalConfig, TradetermError> {
    let name = config
        .get_string("terminal", "name")
        .unwrap_or_else(|| "tradeterm".to_string());
    let mut terminal = TerminalConfig::new(name, parse_mode(config)?);
    if config.get_string("terminal", "poll_interval_ms").is_some() {
        let ms = config.get_count("terminal", "poll_interval_ms", 2000)?;
        terminal.poll_interval = Duration::from_millis(ms as u64);
    }
    terminal.max_ticks = match config.get_count("terminal", "max_ticks", 0)? {
        0 => None,
        max => Some(max as u64),
    };
    Ok(terminal)
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<SmaCrossConfig, TradetermError> {
    let defaults = SmaCrossConfig::default();
    Ok(SmaCrossConfig {
        fast: config.get_count("strategy", "fast", defaults.fast)?,
        slow: config.get_count("strategy", "slow", defaults.slow)?,
        amount: config.get_double("strategy", "amount", defaults.amount),
        allow_short: config.get_bool("strategy", "allow_short", defaults.allow_short),
        stop_loss_pct: config.get_double("strategy", "stop_loss_pct", defaults.stop_loss_pct),
        take_profit_pct: config.get_double("strategy", "take_profit_pct", defaults.take_profit_pct),
        slippage: config.get_double("strategy", "slippage", defaults.slippage),
        price: parse_applied_price(config)?,
    })
}

pub fn build_source(config: &dyn ConfigPort) -> Result<ThrottledSource, TradetermError> {
    let source = config
        .get_string("remote", "source")
        .unwrap_or_else(|| "http".to_string());
    let inner: Box<dyn BarSource> = match source.trim() {
        "csv" => Box::new(CsvAdapter::new(PathBuf::from(
            config.require_string("remote", "csv_dir")?,
        ))),
        #[cfg(feature = "http")]
        "http" => Box::new(crate::adapters::http_source_adapter::HttpBarSource::from_config(config)?),
        other => {
            return Err(TradetermError::ConfigInvalid {
                section: "remote".into(),
                key: "source".into(),
                reason: format!("source {other:?} is not available in this build"),
            })
        }
    };

    // Local files need no spacing unless asked for.
    let throttle = if source.trim() == "csv" && config.get_string("remote", "min_interval_ms").is_none() {
        ThrottleConfig::unthrottled()
    } else {
        build_throttle_config(config)?
    };
    Ok(ThrottledSource::new(inner, throttle))
}

#[cfg(feature = "sqlite")]
pub fn build_cache(config: &dyn ConfigPort) -> Result<Box<dyn BarCache>, TradetermError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    if config.get_string("sqlite", "path").is_some() {
        Ok(Box::new(SqliteAdapter::from_config(config)?))
    } else {
        tracing::warn!("no [sqlite] path configured; bars are cached in memory for this run only");
        Ok(Box::new(SqliteAdapter::in_memory()?))
    }
}

#[cfg(not(feature = "sqlite"))]
pub fn build_cache(_config: &dyn ConfigPort) -> Result<Box<dyn BarCache>, TradetermError> {
    Err(TradetermError::Database {
        reason: "sqlite feature is required for the bar cache".into(),
    })
}

pub fn build_feed(config: &dyn ConfigPort) -> Result<CandleFeed, TradetermError> {
    Ok(CandleFeed::new(
        build_feed_config(config)?,
        build_cache(config)?,
        build_source(config)?,
        Box::new(SystemClock),
    ))
}

pub fn build_journal(config: &dyn ConfigPort) -> Option<Box<dyn JournalPort>> {
    config
        .get_string("terminal", "journal")
        .filter(|p| !p.trim().is_empty())
        .map(|p| Box::new(JsonJournalAdapter::new(p.trim())) as Box<dyn JournalPort>)
}

pub fn build_terminal(config: &dyn ConfigPort) -> Result<TradeTerminal, TradetermError> {
    let strategy = SmaCross::new(build_strategy_config(config)?);
    TradeTerminal::new(
        build_terminal_config(config)?,
        build_feed(config)?,
        Box::new(strategy),
        build_journal(config),
    )
}

pub fn run_terminal(config: &dyn ConfigPort) -> Result<RunSummary, TradetermError> {
    validate_config(config)?;
    let mut terminal = build_terminal(config)?;
    eprintln!(
        "Running {} on {} {} ({})",
        terminal.config().name,
        terminal.feed().instrument(),
        terminal.feed().period(),
        terminal.config().mode,
    );
    terminal.run()
}

fn run_fetch(config: &dyn ConfigPort, start: &str, end: &str) -> Result<(), TradetermError> {
    validate_remote_config(config)?;
    validate_sqlite_config(config)?;
    let from = parse_datetime("fetch", "start", start)?;
    let to = parse_datetime("fetch", "end", end)?;
    if from > to {
        return Err(TradetermError::ConfigInvalid {
            section: "fetch".into(),
            key: "start".into(),
            reason: "start must not be after end".into(),
        });
    }

    let feed_config = FeedConfig {
        instrument: config.require_string("terminal", "instrument")?,
        period: parse_period(config, "period")?,
        window: config.get_count("terminal", "window", DEFAULT_WINDOW)?.max(1),
        lookback: config.get_count("terminal", "lookback", 0)?,
        mode: FeedMode::Backtest { from, to },
        tick_period: None,
    };
    let feed = CandleFeed::new(
        feed_config,
        build_cache(config)?,
        build_source(config)?,
        Box::new(SystemClock),
    );

    let cached = feed.warm(from, to)?;
    let expected = feed.period().bar_count(feed.period().floor(from), feed.period().floor(to));
    println!(
        "{} {}: {} of {} bars cached ({} remote calls)",
        feed.instrument(),
        feed.period(),
        cached.min(expected),
        expected,
        feed.source().calls()
    );
    Ok(())
}

fn run_info(config: &dyn ConfigPort) -> Result<(), TradetermError> {
    validate_sqlite_config(config)?;
    let cache = build_cache(config)?;
    let ranges = cache.ranges()?;
    if ranges.is_empty() {
        println!("cache is empty");
        return Ok(());
    }
    println!("{:<12} {:<6} {:<20} {:<20} {:>8}", "pair", "period", "first", "last", "bars");
    for r in ranges {
        println!(
            "{:<12} {:<6} {:<20} {:<20} {:>8}",
            r.instrument,
            r.period,
            r.first.to_string(),
            r.last.to_string(),
            r.bars
        );
    }
    Ok(())
}

fn run_positions(path: &PathBuf, period: &str) -> Result<(), TradetermError> {
    let period: Period = period.parse().map_err(|e: crate::domain::period::ParsePeriodError| {
        TradetermError::ConfigInvalid {
            section: "positions".into(),
            key: "period".into(),
            reason: e.to_string(),
        }
    })?;
    let records = JsonJournalAdapter::new(path).load()?;
    let mut total = 0.0;

    println!(
        "{:>3} {:<10} {:<9} {:<5} {:<19} {:>12} {:<19} {:>12} {:>12}",
        "id", "pair", "state", "side", "opened", "open", "closed", "close", "profit"
    );
    for (i, record) in records.iter().enumerate() {
        let details = record.to_details(i, &record.currency_pair, period)?;
        total += details.profit();
        let fmt_time = |t: Option<NaiveDateTime>| t.map(|t| t.to_string()).unwrap_or_default();
        let fmt_price = |p: Option<f64>| p.map(|p| format!("{p:.4}")).unwrap_or_default();
        println!(
            "{:>3} {:<10} {:<9} {:<5} {:<19} {:>12} {:<19} {:>12} {:>12.4}",
            i,
            details.instrument,
            details.state,
            details.side.map(|s| s.to_string()).unwrap_or_default(),
            fmt_time(details.open_time),
            fmt_price(details.exec_open_price),
            fmt_time(details.close_time),
            fmt_price(details.exec_close_price),
            details.profit()
        );
    }
    println!("total profit: {total:.4}");
    Ok(())
}
