//! Position lifecycle and repository aggregate tests.

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tradeterm::domain::error::PositionError;
use tradeterm::domain::period::Period;
use tradeterm::domain::position::{
    ClosingResult, OpenRequest, OpeningResult, PositionState, Side,
};
use tradeterm::domain::repository::PositionRepository;

fn repo() -> PositionRepository {
    PositionRepository::new("btc_jpy", Period::H1)
}

mod scenarios {
    use super::*;

    #[test]
    fn long_and_short_over_the_same_move() {
        let mut r = repo();
        let long = r.create();
        long.open(OpenRequest::new(hour(1), Side::Long, 100.0, 1.0)).unwrap();
        long.close(hour(4), 110.0, "take").unwrap();
        assert_relative_eq!(r.get(0).unwrap().profit(), 10.0);

        let short = r.create();
        short.open(OpenRequest::new(hour(1), Side::Short, 100.0, 1.0)).unwrap();
        short.close(hour(4), 110.0, "stop").unwrap();
        assert_relative_eq!(r.get(1).unwrap().profit(), -10.0);

        assert_relative_eq!(r.total_profit(), 0.0);
        assert_eq!(r.get(0).unwrap().hold_period(hour(9)), 3);
    }

    #[test]
    fn open_position_holds_until_now() {
        let mut r = repo();
        r.create()
            .open(OpenRequest::new(at(1, 10, 20), Side::Long, 100.0, 1.0))
            .unwrap();
        let p = r.get(0).unwrap();
        assert_eq!(p.hold_period(hour(10)), 0);
        assert_eq!(p.hold_period(at(1, 15, 59)), 5);
        assert_relative_eq!(p.profit(), 0.0);
    }

    #[test]
    fn opening_handlers_fold_in_subscription_order() {
        let mut r = repo();
        r.on_opening().subscribe(|_, res| OpeningResult {
            exec_price: res.exec_price + 1.0,
            ..res
        });
        r.on_opening().subscribe(|_, res| OpeningResult {
            exec_price: res.exec_price * 2.0,
            exec_amount: 0.5,
            ..res
        });

        let p = r.create();
        p.open(OpenRequest::new(hour(0), Side::Long, 100.0, 1.0)).unwrap();
        assert_eq!(p.exec_open_price, Some(202.0));
        assert_eq!(p.exec_order_amount, Some(0.5));
        assert_eq!(p.open_price, Some(100.0));
        assert_eq!(p.order_amount, 1.0);
    }

    #[test]
    fn canceled_position_cannot_be_closed() {
        let mut r = repo();
        r.on_opening().subscribe(|_, res| OpeningResult { cancel: true, ..res });
        let p = r.create();
        assert_eq!(
            p.open(OpenRequest::new(hour(0), Side::Long, 100.0, 1.0)).unwrap(),
            PositionState::Canceled
        );
        assert!(p.is_canceled() && !p.is_opened() && !p.is_closed());
        assert_eq!(p.exec_open_price, None);

        let err = p.close(hour(1), 101.0, "").unwrap_err();
        assert_eq!(
            err,
            PositionError::InvalidTransition {
                id: 0,
                action: "close",
                state: PositionState::Canceled
            }
        );
        assert_relative_eq!(r.total_profit(), 0.0);
    }

    #[test]
    fn closing_sees_requested_close() {
        let mut r = repo();
        let seen = Rc::new(RefCell::new(None));
        let s = Rc::clone(&seen);
        r.on_closing().subscribe(move |ev, res| {
            *s.borrow_mut() = Some((ev.position.close_price, ev.position.close_comment.clone()));
            ClosingResult {
                exec_price: res.exec_price - 0.5,
            }
        });

        let p = r.create();
        p.open(OpenRequest::new(hour(0), Side::Long, 100.0, 1.0)).unwrap();
        assert_eq!(p.close(hour(2), 110.0, "exit").unwrap(), 109.5);
        assert_eq!(*seen.borrow(), Some((Some(110.0), "exit".to_string())));
        assert_relative_eq!(r.total_profit(), 9.5);
    }

    #[test]
    fn lifecycle_events_reach_repository_observers() {
        let mut r = repo();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, event) in [
            ("opened", r.on_opened()),
            ("closed", r.on_closed()),
            ("canceled", r.on_canceled()),
        ] {
            let log = Rc::clone(&log);
            event.listen(move |ev| log.borrow_mut().push((name, ev.id, ev.position.state)));
        }
        let cancel_next = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancel_next);
        r.on_opening().subscribe(move |_, res| OpeningResult {
            cancel: flag.get(),
            ..res
        });

        let a = r.create();
        a.open(OpenRequest::new(hour(0), Side::Long, 100.0, 1.0)).unwrap();
        a.close(hour(1), 101.0, "").unwrap();
        cancel_next.set(true);
        r.create()
            .open(OpenRequest::new(hour(1), Side::Short, 101.0, 1.0))
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                ("opened", 0, PositionState::Opened),
                ("closed", 0, PositionState::Closed),
                ("canceled", 1, PositionState::Canceled),
            ]
        );
    }

    #[test]
    fn double_open_is_rejected() {
        let mut r = repo();
        let p = r.create();
        p.open(OpenRequest::new(hour(0), Side::Long, 100.0, 1.0)).unwrap();
        assert!(matches!(
            p.open(OpenRequest::new(hour(1), Side::Long, 100.0, 1.0)),
            Err(PositionError::InvalidTransition { action: "open", .. })
        ));
        assert_eq!(p.open_time, Some(hour(0)));
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create,
    Open {
        index: usize,
        side: Side,
        price: u32,
        cancel: bool,
    },
    Close {
        index: usize,
        price: u32,
    },
}

fn op() -> impl Strategy<Value = Op> {
    let side = prop_oneof![Just(Side::Long), Just(Side::Short)];
    prop_oneof![
        1 => Just(Op::Create),
        2 => (0..6usize, side, 1..1000u32, prop::bool::weighted(0.2)).prop_map(
            |(index, side, price, cancel)| Op::Open { index, side, price, cancel }
        ),
        2 => (0..6usize, 1..1000u32).prop_map(|(index, price)| Op::Close { index, price }),
    ]
}

#[derive(Debug, Clone, Copy)]
struct Model {
    state: PositionState,
    side: Option<Side>,
    open: f64,
    close: f64,
}

impl Model {
    fn profit(&self) -> f64 {
        match (self.state, self.side) {
            (PositionState::Closed, Some(Side::Long)) => self.close - self.open,
            (PositionState::Closed, Some(Side::Short)) => self.open - self.close,
            _ => 0.0,
        }
    }
}

proptest! {
    #[test]
    fn repository_follows_the_state_machine(ops in prop::collection::vec(op(), 1..40)) {
        let mut r = repo();
        let cancel = Rc::new(Cell::new(false));
        let flag = Rc::clone(&cancel);
        r.on_opening().subscribe(move |_, res| OpeningResult { cancel: flag.get(), ..res });

        let mut model: Vec<Model> = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    r.create();
                    model.push(Model {
                        state: PositionState::Pending,
                        side: None,
                        open: 0.0,
                        close: 0.0,
                    });
                }
                Op::Open { index, side, price, cancel: veto } => {
                    if index >= model.len() {
                        prop_assert!(r.get_mut(index).is_none());
                        continue;
                    }
                    cancel.set(veto);
                    let result = r
                        .require_mut(index)
                        .unwrap()
                        .open(OpenRequest::new(hour(0), side, price as f64, 1.0));
                    let m = &mut model[index];
                    if m.state == PositionState::Pending {
                        let expected = if veto { PositionState::Canceled } else { PositionState::Opened };
                        prop_assert_eq!(result, Ok(expected));
                        m.state = expected;
                        m.side = Some(side);
                        m.open = price as f64;
                    } else {
                        let rejected = matches!(result, Err(PositionError::InvalidTransition { .. }));
                        prop_assert!(rejected);
                    }
                }
                Op::Close { index, price } => {
                    if index >= model.len() {
                        continue;
                    }
                    let result = r.require_mut(index).unwrap().close(hour(3), price as f64, "");
                    let m = &mut model[index];
                    if m.state == PositionState::Opened {
                        prop_assert_eq!(result, Ok(price as f64));
                        m.state = PositionState::Closed;
                        m.close = price as f64;
                    } else {
                        let rejected = matches!(result, Err(PositionError::InvalidTransition { .. }));
                        prop_assert!(rejected);
                    }
                }
            }

            prop_assert_eq!(r.len(), model.len());
            for (p, m) in r.positions().iter().zip(&model) {
                prop_assert_eq!(p.state, m.state);
                if p.is_canceled() {
                    prop_assert!(!p.is_opened() && !p.is_closed());
                }
                if p.is_closed() {
                    prop_assert!(p.is_opened());
                }
            }
            let expected: f64 = model.iter().map(Model::profit).sum();
            prop_assert!((r.total_profit() - expected).abs() < 1e-9);

            for side in [Side::Long, Side::Short] {
                let open: Vec<usize> = model
                    .iter()
                    .enumerate()
                    .filter(|(_, m)| m.state == PositionState::Opened && m.side == Some(side))
                    .map(|(i, _)| i)
                    .collect();
                prop_assert_eq!(r.open_ids(side), open);
            }
        }
    }

    #[test]
    fn profit_is_antisymmetric_in_side(open in 1..10_000u32, close in 1..10_000u32) {
        let mut r = repo();
        for side in [Side::Long, Side::Short] {
            let p = r.create();
            p.open(OpenRequest::new(hour(0), side, open as f64, 1.0)).unwrap();
            p.close(hour(1), close as f64, "").unwrap();
        }
        let long = r.get(0).unwrap().profit();
        let short = r.get(1).unwrap().profit();
        prop_assert!((long + short).abs() < 1e-9);
        prop_assert!((long - (close as f64 - open as f64)).abs() < 1e-9);
        prop_assert!(r.total_profit().abs() < 1e-9);
    }
}
