//! Synchronous publish/subscribe.
//!
//! An [`Event`] holds an ordered list of handlers. Firing folds a seed value
//! through every handler in subscription order; each handler receives the
//! event argument plus the value returned by the previous handler, and the
//! firer gets the final value back. Notification events use `R = ()`;
//! negotiation events use a typed result such as an execution price.
//!
//! The handler list is snapshotted before each fire, so handlers may
//! subscribe or unsubscribe (on this or any other event) while running. The
//! change applies from the next fire.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<A, R> = Rc<dyn Fn(&A, R) -> R>;

pub struct Event<A, R = ()> {
    handlers: RefCell<Vec<(HandlerId, Handler<A, R>)>>,
    next_id: Cell<u64>,
}

impl<A, R> Event<A, R> {
    pub fn new() -> Self {
        Event {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&A, R) -> R + 'static,
    {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    pub fn fire(&self, args: &A, seed: R) -> R {
        let snapshot: Vec<Handler<A, R>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        snapshot.iter().fold(seed, |acc, handler| handler(args, acc))
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

impl<A> Event<A, ()> {
    /// Subscribe a handler that only observes.
    pub fn listen<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&A) + 'static,
    {
        self.subscribe(move |args, ()| handler(args))
    }

    pub fn notify(&self, args: &A) {
        self.fire(args, ())
    }
}

impl<A, R> Default for Event<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> fmt::Debug for Event<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_subscription_order() {
        let event: Event<u32> = Event::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            event.listen(move |n| log.borrow_mut().push(format!("{tag}{n}")));
        }
        event.notify(&7);
        assert_eq!(*log.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn later_handler_sees_earlier_result() {
        let event: Event<(), f64> = Event::new();
        event.subscribe(|_, price| price + 1.0);
        event.subscribe(|_, price| price * 2.0);
        assert_eq!(event.fire(&(), 10.0), 22.0);
    }

    #[test]
    fn no_handlers_returns_seed() {
        let event: Event<(), i32> = Event::new();
        assert!(event.is_empty());
        assert_eq!(event.fire(&(), 5), 5);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let event: Event<(), i32> = Event::new();
        let first = event.subscribe(|_, v| v + 1);
        event.subscribe(|_, v| v + 10);
        assert!(event.unsubscribe(first));
        assert!(!event.unsubscribe(first));
        assert_eq!(event.len(), 1);
        assert_eq!(event.fire(&(), 0), 10);
    }

    #[test]
    fn unsubscribe_during_fire_applies_next_time() {
        let event: Rc<Event<()>> = Rc::new(Event::new());
        let calls = Rc::new(Cell::new(0));
        let id_slot: Rc<Cell<Option<HandlerId>>> = Rc::new(Cell::new(None));

        let ev = Rc::downgrade(&event);
        let slot = Rc::clone(&id_slot);
        let c = Rc::clone(&calls);
        let id = event.listen(move |_| {
            c.set(c.get() + 1);
            if let (Some(ev), Some(id)) = (ev.upgrade(), slot.get()) {
                ev.unsubscribe(id);
            }
        });
        id_slot.set(Some(id));

        let c = Rc::clone(&calls);
        event.listen(move |_| c.set(c.get() + 100));

        event.notify(&());
        assert_eq!(calls.get(), 101);
        event.notify(&());
        assert_eq!(calls.get(), 201);
    }

    #[test]
    fn subscribe_during_fire_applies_next_time() {
        let event: Rc<Event<()>> = Rc::new(Event::new());
        let calls = Rc::new(Cell::new(0));

        let ev = Rc::downgrade(&event);
        let c = Rc::clone(&calls);
        event.listen(move |_| {
            if let Some(ev) = ev.upgrade() {
                let inner = Rc::clone(&c);
                ev.listen(move |_| inner.set(inner.get() + 1));
            }
        });

        event.notify(&());
        assert_eq!(calls.get(), 0);
        event.notify(&());
        assert_eq!(calls.get(), 1);
    }
}
