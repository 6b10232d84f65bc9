//! Trade terminal: the read-evaluate-advance loop.
//!
//! Each step advances the feed, works out whether a new bar arrived, and
//! hands the window to the strategy. The strategy's fill policy negotiates
//! every open and close in all modes. In practice mode the repository is also
//! restored from the journal at start, and the journal is rewritten after each
//! opened, canceled or closed event.

use crate::domain::error::TradetermError;
use crate::domain::feed::CandleFeed;
use crate::domain::journal::PositionRecord;
use crate::domain::position::{PositionEvent, PositionId};
use crate::domain::repository::PositionRepository;
use crate::domain::strategy::{Strategy, TickContext};
use crate::ports::journal_port::JournalPort;
use chrono::NaiveDateTime;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeMode {
    Backtest,
    ForwardTest,
    Practice,
}

impl TradeMode {
    /// Modes that poll the remote in real time.
    pub fn is_live(self) -> bool {
        !matches!(self, TradeMode::Backtest)
    }
}

impl fmt::Display for TradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeMode::Backtest => write!(f, "backtest"),
            TradeMode::ForwardTest => write!(f, "forwardtest"),
            TradeMode::Practice => write!(f, "practice"),
        }
    }
}

impl FromStr for TradeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "backtest" => Ok(TradeMode::Backtest),
            "forwardtest" => Ok(TradeMode::ForwardTest),
            "practice" => Ok(TradeMode::Practice),
            other => Err(format!(
                "unknown trade mode: {other} (expected backtest, forwardtest or practice)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminalConfig {
    pub name: String,
    pub mode: TradeMode,
    pub poll_interval: Duration,
    pub max_ticks: Option<u64>,
}

impl TerminalConfig {
    pub fn new(name: impl Into<String>, mode: TradeMode) -> Self {
        TerminalConfig {
            name: name.into(),
            mode,
            poll_interval: Duration::from_secs(2),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub positions: usize,
    pub closed: usize,
    pub canceled: usize,
    pub total_profit: f64,
}

type SaveSlot = Rc<RefCell<Option<TradetermError>>>;

/// Journal image kept in step with position events. The repository itself is
/// mutably borrowed while those events fire.
struct JournalMirror {
    journal: Rc<dyn JournalPort>,
    records: RefCell<BTreeMap<PositionId, PositionRecord>>,
    failure: SaveSlot,
}

impl JournalMirror {
    fn record(&self, event: &PositionEvent) {
        let snapshot = {
            let mut records = self.records.borrow_mut();
            records.insert(event.id, PositionRecord::from_details(&event.position));
            records.values().cloned().collect::<Vec<_>>()
        };
        if let Err(err) = self.journal.save(&snapshot) {
            tracing::error!(position = event.id, error = %err, "journal save failed");
            let mut failure = self.failure.borrow_mut();
            if failure.is_none() {
                *failure = Some(err);
            }
        }
    }
}

pub struct TradeTerminal {
    config: TerminalConfig,
    feed: CandleFeed,
    strategy: Box<dyn Strategy>,
    repository: PositionRepository,
    save_failure: SaveSlot,
    evaluated_til: Option<NaiveDateTime>,
    ticks: u64,
    initialized: bool,
}

impl TradeTerminal {
    pub fn new(
        config: TerminalConfig,
        feed: CandleFeed,
        strategy: Box<dyn Strategy>,
        journal: Option<Box<dyn JournalPort>>,
    ) -> Result<Self, TradetermError> {
        if config.mode.is_live() == feed.is_backtest() {
            let wanted = if config.mode.is_live() { "live" } else { "backtest" };
            return Err(TradetermError::ConfigInvalid {
                section: "terminal".into(),
                key: "mode".into(),
                reason: format!("{} mode needs a {} feed", config.mode, wanted),
            });
        }

        let mut repository = PositionRepository::new(feed.instrument(), feed.period());
        let save_failure: SaveSlot = Rc::new(RefCell::new(None));

        let policy = strategy.fill_policy();
        let opening = Rc::clone(&policy);
        repository
            .on_opening()
            .subscribe(move |ev, requested| opening.on_position_opening(ev, requested));
        repository
            .on_closing()
            .subscribe(move |ev, requested| policy.on_position_closing(ev, requested));

        if config.mode == TradeMode::Practice {
            let journal: Rc<dyn JournalPort> = match journal {
                Some(j) => Rc::from(j),
                None => {
                    return Err(TradetermError::ConfigMissing {
                        section: "terminal".into(),
                        key: "journal".into(),
                    })
                }
            };

            repository.restore_from(journal.as_ref())?;

            let mirror = Rc::new(JournalMirror {
                journal,
                records: RefCell::new(repository.to_journal().into_iter().enumerate().collect()),
                failure: Rc::clone(&save_failure),
            });
            for event in [repository.on_opened(), repository.on_closed(), repository.on_canceled()] {
                let mirror = Rc::clone(&mirror);
                event.listen(move |ev| mirror.record(ev));
            }
        } else if journal.is_some() {
            tracing::warn!(mode = %config.mode, "journal is only used in practice mode; ignoring");
        }

        Ok(TradeTerminal {
            config,
            feed,
            strategy,
            repository,
            save_failure,
            evaluated_til: None,
            ticks: 0,
            initialized: false,
        })
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn feed(&self) -> &CandleFeed {
        &self.feed
    }

    pub fn repository(&self) -> &PositionRepository {
        &self.repository
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One advance plus one strategy evaluation. Returns false once the feed
    /// is exhausted.
    pub fn step(&mut self) -> Result<bool, TradetermError> {
        if !self.initialized {
            self.strategy.on_init(&self.feed);
            self.initialized = true;
        }

        if !self.feed.advance()? {
            return Ok(false);
        }

        let bars = self.feed.get_bars(0);
        let last = bars.last_time();
        let is_new_bar = match (last, self.evaluated_til) {
            (Some(t), Some(seen)) => t > seen,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if is_new_bar {
            self.evaluated_til = last;
        }

        let ctx = TickContext {
            bars: &bars,
            is_new_bar,
            now: self.feed.now(),
        };
        self.strategy.on_tick(&ctx, &mut self.repository)?;

        if let Some(err) = self.save_failure.borrow_mut().take() {
            return Err(err);
        }
        self.ticks += 1;
        Ok(true)
    }

    pub fn run(&mut self) -> Result<RunSummary, TradetermError> {
        tracing::info!(
            terminal = %self.config.name,
            mode = %self.config.mode,
            instrument = self.feed.instrument(),
            period = %self.feed.period(),
            strategy = self.strategy.name(),
            "terminal started"
        );

        loop {
            if self.config.max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }
            if !self.step()? {
                break;
            }
            if self.config.mode.is_live() {
                self.feed.clock().sleep(self.config.poll_interval);
            }
        }

        let summary = self.summary();
        tracing::info!(
            terminal = %self.config.name,
            ticks = summary.ticks,
            positions = summary.positions,
            closed = summary.closed,
            total_profit = summary.total_profit,
            "terminal finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        let positions = self.repository.positions();
        RunSummary {
            ticks: self.ticks,
            positions: positions.len(),
            closed: positions.iter().filter(|p| p.is_closed()).count(),
            canceled: positions.iter().filter(|p| p.is_canceled()).count(),
            total_profit: self.repository.total_profit(),
        }
    }
}
