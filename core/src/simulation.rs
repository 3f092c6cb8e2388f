//! Simulation and forwarding collaborators.
//!
//! RULE: The session owns exactly one Simulation and drives it one input
//! event at a time. Everything the simulation mutates must be reachable
//! from `root()`, otherwise undo cannot roll it back.

use crate::{classify::ClassifierTable, error::RewindResult, event::LogRecord, live::ObjRef};
use serde::{de::DeserializeOwned, Serialize};

/// The contract a steppable simulation must fulfill.
pub trait Simulation {
    /// Input applied per step. Persisted verbatim in the log.
    type Event: Serialize + DeserializeOwned + Clone + std::fmt::Debug + 'static;

    /// Unique stable name for this simulation.
    fn name(&self) -> &'static str;

    /// The root of the live graph captured before each speculative step.
    fn root(&self) -> ObjRef;

    /// Canonical progress indicator, stamped on every logged record and
    /// used to resynchronise replays.
    fn resume_marker(&self) -> String;

    /// Apply one input event.
    fn step(&mut self, event: &Self::Event) -> RewindResult<()>;

    /// Classifier entries this simulation's graph needs. Configuration
    /// entries are merged on top.
    fn classifier(&self) -> ClassifierTable {
        ClassifierTable::default()
    }

    /// False while the simulation is mid-transition. Undo and redo keep
    /// going until they land on a settled state or run out of history.
    fn is_settled(&self) -> bool {
        true
    }
}

/// Receives committed records for forwarding to the authority.
pub trait EventSink<E> {
    fn forward(&mut self, record: &LogRecord<E>) -> RewindResult<()>;
}

/// Drops everything. Used when there is no authority to forward to.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl<E> EventSink<E> for NullSink {
    fn forward(&mut self, _record: &LogRecord<E>) -> RewindResult<()> {
        Ok(())
    }
}

/// Keeps every forwarded record in memory.
#[derive(Debug, Clone)]
pub struct VecSink<E> {
    pub records: Vec<LogRecord<E>>,
}

impl<E> Default for VecSink<E> {
    fn default() -> Self {
        Self { records: Vec::new() }
    }
}

impl<E: Clone> EventSink<E> for VecSink<E> {
    fn forward(&mut self, record: &LogRecord<E>) -> RewindResult<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// A sink shared with the caller, so tests and drivers can inspect what
/// was forwarded while the session owns the sink.
impl<E, S: EventSink<E>> EventSink<E> for std::rc::Rc<std::cell::RefCell<S>> {
    fn forward(&mut self, record: &LogRecord<E>) -> RewindResult<()> {
        self.borrow_mut().forward(record)
    }
}
