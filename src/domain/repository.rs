//! Insertion-ordered positions for one feed, plus the event hub that relays
//! every position's lifecycle events tagged with the repository id.

use crate::domain::error::{JournalError, PositionError, TradetermError};
use crate::domain::event::Event;
use crate::domain::journal::{decode_all, PositionRecord};
use crate::domain::period::Period;
use crate::domain::position::{
    ClosingResult, OpeningResult, Position, PositionDetails, PositionEvent, PositionEvents,
    PositionId, Side,
};
use crate::ports::journal_port::JournalPort;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REPOSITORY: AtomicU64 = AtomicU64::new(1);

/// Process-unique repository identity carried on relayed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepositoryId(u64);

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repo#{}", self.0)
    }
}

#[derive(Debug)]
pub struct PositionRepository {
    id: RepositoryId,
    instrument: String,
    period: Period,
    positions: Vec<Position>,
    events: Rc<PositionEvents>,
}

impl PositionRepository {
    pub fn new(instrument: impl Into<String>, period: Period) -> Self {
        PositionRepository {
            id: RepositoryId(NEXT_REPOSITORY.fetch_add(1, Ordering::Relaxed)),
            instrument: instrument.into(),
            period,
            positions: Vec::new(),
            events: Rc::new(PositionEvents::default()),
        }
    }

    pub fn id(&self) -> RepositoryId {
        self.id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn on_opening(&self) -> &Event<PositionEvent, OpeningResult> {
        &self.events.opening
    }

    pub fn on_closing(&self) -> &Event<PositionEvent, ClosingResult> {
        &self.events.closing
    }

    pub fn on_opened(&self) -> &Event<PositionEvent> {
        &self.events.opened
    }

    pub fn on_closed(&self) -> &Event<PositionEvent> {
        &self.events.closed
    }

    pub fn on_canceled(&self) -> &Event<PositionEvent> {
        &self.events.canceled
    }

    fn relay(&self, position: &Position) {
        let id = self.id;
        let tag = move |ev: &PositionEvent| PositionEvent {
            repository: Some(id),
            ..ev.clone()
        };

        let hub = Rc::clone(&self.events);
        position
            .on_opening()
            .subscribe(move |ev, seed| hub.opening.fire(&tag(ev), seed));
        let hub = Rc::clone(&self.events);
        position
            .on_closing()
            .subscribe(move |ev, seed| hub.closing.fire(&tag(ev), seed));
        let hub = Rc::clone(&self.events);
        position.on_opened().listen(move |ev| hub.opened.notify(&tag(ev)));
        let hub = Rc::clone(&self.events);
        position.on_closed().listen(move |ev| hub.closed.notify(&tag(ev)));
        let hub = Rc::clone(&self.events);
        position
            .on_canceled()
            .listen(move |ev| hub.canceled.notify(&tag(ev)));
    }

    fn push(&mut self, details: PositionDetails) -> &mut Position {
        let id = self.positions.len();
        let position = Position::new(id, details);
        self.relay(&position);
        self.positions.push(position);
        &mut self.positions[id]
    }

    /// New pending position wired into this repository's events.
    pub fn create(&mut self) -> &mut Position {
        let details = PositionDetails::new(self.instrument.clone(), self.period);
        self.push(details)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn get_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        self.positions.get_mut(id)
    }

    pub fn require_mut(&mut self, id: PositionId) -> Result<&mut Position, PositionError> {
        self.positions
            .get_mut(id)
            .ok_or(PositionError::NotFound(id))
    }

    /// Opened, not closed, not canceled, on `side`.
    pub fn get_open(&self, side: Side) -> Vec<&Position> {
        self.positions
            .iter()
            .filter(|p| p.is_open() && p.side == Some(side))
            .collect()
    }

    pub fn get_open_mut(&mut self, side: Side) -> Vec<&mut Position> {
        self.positions
            .iter_mut()
            .filter(|p| p.is_open() && p.side == Some(side))
            .collect()
    }

    pub fn open_ids(&self, side: Side) -> Vec<PositionId> {
        self.get_open(side).iter().map(|p| p.id()).collect()
    }

    pub fn total_profit(&self) -> f64 {
        self.positions.iter().map(|p| p.profit()).sum()
    }

    pub fn to_journal(&self) -> Vec<PositionRecord> {
        self.positions
            .iter()
            .map(|p| PositionRecord::from_details(p.details()))
            .collect()
    }

    /// Append the journaled positions. Nothing is appended if any record is bad.
    pub fn load_journal(&mut self, records: &[PositionRecord]) -> Result<usize, JournalError> {
        let decoded = decode_all(records, &self.instrument, self.period)?;
        let count = decoded.len();
        for details in decoded {
            self.push(details);
        }
        Ok(count)
    }

    pub fn save_as_journal(&self, journal: &dyn JournalPort) -> Result<(), TradetermError> {
        journal.save(&self.to_journal())
    }

    pub fn restore_from(&mut self, journal: &dyn JournalPort) -> Result<usize, TradetermError> {
        let records = journal.load()?;
        let count = self.load_journal(&records)?;
        tracing::info!(repository = %self.id, instrument = %self.instrument, count, "journal restored");
        Ok(count)
    }
}
