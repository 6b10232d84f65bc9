mod common;

use approx::assert_relative_eq;
use common::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;
use tradeterm::adapters::json_journal_adapter::JsonJournalAdapter;
use tradeterm::domain::error::TradetermError;
use tradeterm::domain::feed::{CandleFeed, FeedConfig, FeedMode};
use tradeterm::domain::journal::PositionRecord;
use tradeterm::domain::period::Period;
use tradeterm::domain::position::{PositionState, Side};
use tradeterm::domain::repository::PositionRepository;
use tradeterm::domain::strategy::{SmaCross, SmaCrossConfig, Strategy, TickContext};
use tradeterm::domain::terminal::{RunSummary, TerminalConfig, TradeMode, TradeTerminal};
use tradeterm::ports::journal_port::JournalPort;

/// Fast SMA(2) crosses above SMA(3) at 04:00 and back below at 07:00.
const CLOSES: [f64; 11] = [10.0, 10.0, 10.0, 10.0, 14.0, 18.0, 18.0, 10.0, 6.0, 6.0, 6.0];

fn history() -> MockBarSource {
    MockBarSource::new().with_bars(Period::H1, series(hour(0), Period::H1, &CLOSES))
}

fn sma_cross(allow_short: bool, slippage: f64) -> Box<dyn Strategy> {
    Box::new(SmaCross::new(SmaCrossConfig {
        fast: 2,
        slow: 3,
        amount: 1.0,
        allow_short,
        slippage,
        ..SmaCrossConfig::default()
    }))
}

fn live_config() -> FeedConfig {
    FeedConfig {
        instrument: "btc_jpy".into(),
        period: Period::H1,
        window: 4,
        lookback: 0,
        mode: FeedMode::Live,
        tick_period: None,
    }
}

fn practice(max_ticks: u64) -> TerminalConfig {
    TerminalConfig {
        poll_interval: Duration::from_secs(3600),
        max_ticks: Some(max_ticks),
        ..TerminalConfig::new("practice", TradeMode::Practice)
    }
}

mod backtest {
    use super::*;

    fn terminal(allow_short: bool, max_ticks: Option<u64>) -> TradeTerminal {
        let feed = make_feed(
            backtest_config(Period::H1, 4, hour(0), hour(10)),
            &MemoryCache::new(),
            &history(),
            ManualClock::at(hour(0)),
        );
        let config = TerminalConfig {
            max_ticks,
            ..TerminalConfig::new("bt", TradeMode::Backtest)
        };
        TradeTerminal::new(config, feed, sma_cross(allow_short, 0.0), None).unwrap()
    }

    #[test]
    fn runs_to_the_end_of_the_range() {
        let mut t = terminal(false, None);
        let summary = t.run().unwrap();
        assert_eq!(
            summary,
            RunSummary {
                ticks: 11,
                positions: 1,
                closed: 1,
                canceled: 0,
                total_profit: -4.0,
            }
        );

        let p = t.repository().get(0).unwrap();
        assert_eq!(p.side, Some(Side::Long));
        assert_eq!(p.open_time, Some(hour(4)));
        assert_eq!(p.close_time, Some(hour(7)));
        assert_eq!(p.open_comment, "golden cross");
        assert_eq!(p.close_comment, "dead cross");
        assert_eq!(p.hold_period(hour(10)), 3);
        assert_eq!(t.feed().cursor(), Some(hour(10)));
    }

    #[test]
    fn short_side_stays_open_at_the_end() {
        let mut t = terminal(true, None);
        let summary = t.run().unwrap();
        assert_eq!(summary.positions, 2);
        assert_eq!(summary.closed, 1);
        assert_relative_eq!(summary.total_profit, -4.0);
        assert_eq!(t.repository().open_ids(Side::Short), vec![1]);
        assert_eq!(t.repository().get(1).unwrap().open_price, Some(10.0));
    }

    #[test]
    fn max_ticks_stops_early() {
        let mut t = terminal(false, Some(5));
        let summary = t.run().unwrap();
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.positions, 1);
        assert_eq!(summary.closed, 0);
        assert_eq!(t.feed().cursor(), Some(hour(4)));
    }

    #[test]
    fn slippage_applies_to_backtest_fills() {
        let feed = make_feed(
            backtest_config(Period::H1, 4, hour(0), hour(10)),
            &MemoryCache::new(),
            &history(),
            ManualClock::at(hour(0)),
        );
        let mut t = TradeTerminal::new(
            TerminalConfig::new("bt", TradeMode::Backtest),
            feed,
            sma_cross(false, 1.0),
            None,
        )
        .unwrap();
        let summary = t.run().unwrap();

        let p = t.repository().get(0).unwrap();
        assert_eq!(p.open_price, Some(14.0));
        assert_eq!(p.exec_open_price, Some(15.0));
        assert_eq!(p.close_price, Some(10.0));
        assert_eq!(p.exec_close_price, Some(9.0));
        assert_relative_eq!(summary.total_profit, -6.0);
    }

    #[test]
    fn exhausted_feed_keeps_returning_false() {
        let mut t = terminal(false, None);
        t.run().unwrap();
        assert!(!t.step().unwrap());
        assert_eq!(t.ticks(), 11);
    }
}

/// Records what the terminal hands to the strategy on every tick.
struct Recorder {
    seen: Rc<RefCell<Vec<(bool, f64)>>>,
}

impl Strategy for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_tick(
        &mut self,
        ctx: &TickContext<'_>,
        _repository: &mut PositionRepository,
    ) -> Result<(), TradetermError> {
        if let Some(close) = ctx.bars.last_close() {
            self.seen.borrow_mut().push((ctx.is_new_bar, close));
        }
        Ok(())
    }
}

#[test]
fn new_bar_flag_is_set_once_per_bar_under_tick_simulation() {
    let source = MockBarSource::new().with_bars(Period::H1, rising(hour(0), Period::H1, 3));
    let config = FeedConfig {
        tick_period: Some(Period::M15),
        ..backtest_config(Period::H1, 4, hour(0), hour(2))
    };
    let feed = make_feed(config, &MemoryCache::new(), &source, ManualClock::at(hour(0)));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let strategy = Box::new(Recorder {
        seen: Rc::clone(&seen),
    });
    let mut t = TradeTerminal::new(
        TerminalConfig::new("ticks", TradeMode::Backtest),
        feed,
        strategy,
        None,
    )
    .unwrap();

    let summary = t.run().unwrap();
    let seen = seen.borrow();
    assert_eq!(summary.ticks as usize, seen.len());
    let new_bars: Vec<usize> = seen
        .iter()
        .enumerate()
        .filter(|(_, (is_new, _))| *is_new)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(new_bars.len(), 3);
    assert_eq!(new_bars[0], 0);
    // Each bar ends its replay on its own close.
    let last_of_each: Vec<f64> = new_bars[1..]
        .iter()
        .map(|&i| seen[i - 1].1)
        .chain(seen.last().map(|s| s.1))
        .collect();
    assert_eq!(last_of_each, vec![100.0, 101.0, 102.0]);
}

mod practice_mode {
    use super::*;

    fn live_feed(source: &MockBarSource, cache: &MemoryCache, clock: &ManualClock) -> CandleFeed {
        make_feed(live_config(), cache, source, clock.clone())
    }

    #[test]
    fn restart_resumes_from_the_journal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("positions.json");
        let source = history();
        let cache = MemoryCache::new();

        // First session: polls 03:00 and 04:00, opens long at 14 with 1.0 slippage.
        let clock = ManualClock::at(hour(3));
        let mut first = TradeTerminal::new(
            practice(2),
            live_feed(&source, &cache, &clock),
            sma_cross(false, 1.0),
            Some(Box::new(JsonJournalAdapter::new(&path))),
        )
        .unwrap();
        let summary = first.run().unwrap();
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.positions, 1);

        let journal = JsonJournalAdapter::new(&path);
        let records = journal.load().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_opened && !records[0].is_closed);
        assert_eq!(records[0].open_price, Some(14.0));
        assert_eq!(records[0].exec_open_price, Some(15.0));
        assert!(cache.len() >= 4);

        // Second session picks up at 05:00 and closes on the 07:00 dead cross.
        clock.set(hour(5));
        let mut second = TradeTerminal::new(
            practice(3),
            live_feed(&source, &cache, &clock),
            sma_cross(false, 1.0),
            Some(Box::new(JsonJournalAdapter::new(&path))),
        )
        .unwrap();
        assert_eq!(second.repository().len(), 1);
        let summary = second.run().unwrap();
        assert_eq!(summary.positions, 1);
        assert_eq!(summary.closed, 1);
        assert_relative_eq!(summary.total_profit, 9.0 - 15.0);

        let records = journal.load().unwrap();
        assert_eq!(records.len(), 1);
        let closed = &records[0];
        assert!(closed.is_closed);
        assert_eq!(closed.close_price, Some(10.0));
        assert_eq!(closed.exec_close_price, Some(9.0));
        assert_eq!(closed.close_comment, "dead cross");
        assert_relative_eq!(closed.profit, -6.0);

        let p = second.repository().get(0).unwrap();
        assert_eq!(p.state, PositionState::Closed);
        assert_eq!(p.close_time, Some(hour(7)));
    }

    struct BrokenJournal;

    impl JournalPort for BrokenJournal {
        fn load(&self) -> Result<Vec<PositionRecord>, TradetermError> {
            Ok(Vec::new())
        }

        fn save(&self, _records: &[PositionRecord]) -> Result<(), TradetermError> {
            Err(std::io::Error::other("disk full").into())
        }
    }

    #[test]
    fn journal_failure_stops_the_run() {
        let clock = ManualClock::at(hour(3));
        let mut t = TradeTerminal::new(
            practice(10),
            live_feed(&history(), &MemoryCache::new(), &clock),
            sma_cross(false, 0.0),
            Some(Box::new(BrokenJournal)),
        )
        .unwrap();

        let err = t.run().unwrap_err();
        assert!(matches!(err, TradetermError::Io(_)));
        // The open at 04:00 committed before the save failed.
        assert_eq!(t.ticks(), 1);
        assert_eq!(t.repository().open_ids(Side::Long), vec![0]);
    }

    #[test]
    fn practice_requires_a_journal() {
        let clock = ManualClock::at(hour(3));
        let err = TradeTerminal::new(
            practice(1),
            live_feed(&history(), &MemoryCache::new(), &clock),
            sma_cross(false, 0.0),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            TradetermError::ConfigMissing { ref key, .. } if key == "journal"
        ));
    }

    #[test]
    fn live_mode_rejects_a_backtest_feed() {
        let feed = make_feed(
            backtest_config(Period::H1, 4, hour(0), hour(10)),
            &MemoryCache::new(),
            &history(),
            ManualClock::at(hour(0)),
        );
        let err = TradeTerminal::new(
            TerminalConfig::new("fwd", TradeMode::ForwardTest),
            feed,
            sma_cross(false, 0.0),
            None,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            TradetermError::ConfigInvalid { ref key, .. } if key == "mode"
        ));
    }

    #[test]
    fn backtest_rejects_a_live_feed() {
        let clock = ManualClock::at(hour(3));
        let result = TradeTerminal::new(
            TerminalConfig::new("bt", TradeMode::Backtest),
            live_feed(&history(), &MemoryCache::new(), &clock),
            sma_cross(false, 0.0),
            None,
        );
        assert!(matches!(result, Err(TradetermError::ConfigInvalid { .. })));
    }
}
