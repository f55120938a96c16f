//! Memoized, force-once computation cells.
//!
//! A [`Thunk`] starts *unforced* and holds a suspended computation. The first
//! caller to force it wins a compare-and-swap on the cell state, runs the
//! computation and publishes the outcome; every other caller (on any thread)
//! backs off until the outcome is published and then observes exactly the
//! same value or fault. Faults are memoized like values.
//!
//! State transitions are one-way:
//!
//! ```text
//! UNFORCED --(cas by winner)--> IN_PROGRESS --(publish)--> DONE
//! ```
//!
//! A thread that finds the cell `IN_PROGRESS` under its own ownership is
//! re-entering its own force path and receives [`ValueError::CyclicForce`].
use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use crossbeam::utils::Backoff;
use log::trace;
use parking_lot::Mutex;

use crate::{
    error::{ValueError, ValueResult},
    teardown::{Debris, Rubble, Salvage, teardown},
    value::{Function, Value},
};

const STATE_UNFORCED: usize = 0; // Suspension present, nobody is running it
const STATE_IN_PROGRESS: usize = 1; // Owner is running the suspension (others must wait)
const STATE_DONE: usize = 2; // Outcome is published and immutable

const NO_OWNER: usize = 0;

static NEXT_FORCER_ID: AtomicUsize = AtomicUsize::new(NO_OWNER + 1);

thread_local! {
    static FORCER_ID: usize = NEXT_FORCER_ID.fetch_add(1, Ordering::Relaxed);
}

fn current_forcer() -> usize {
    FORCER_ID.with(|id| *id)
}

/// The suspended computation of an unforced cell.
enum Suspension {
    Compute(Box<dyn FnOnce() -> ValueResult<Value> + Send>),
    // Teardown follows `arg`; application chains nest once per `map`
    Apply { function: Function, arg: Thunk },
}

impl Suspension {
    fn run(self) -> ValueResult<Value> {
        match self {
            Suspension::Compute(compute) => compute(),
            Suspension::Apply { function, arg } => function.call(arg),
        }
    }
}

struct Cell {
    state: AtomicUsize,
    owner: AtomicUsize,
    suspension: Mutex<Option<Suspension>>,
    outcome: OnceLock<ValueResult<Value>>,
}

impl Cell {
    fn publish(&self, outcome: ValueResult<Value>) {
        let _ = self.outcome.set(outcome);
        self.owner.store(NO_OWNER, Ordering::Release);
        self.state.store(STATE_DONE, Ordering::Release);
    }
}

/// Publishes a fault if the suspension unwinds, so waiters are never stranded.
struct ForceGuard<'a> {
    cell: &'a Cell,
    armed: bool,
}

impl Drop for ForceGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cell.publish(Err(ValueError::thrown(
                "deferred computation panicked while being forced",
            )
            .into_memoized()));
        }
    }
}

/// A shared handle to a deferred value.
///
/// Cloning a thunk clones the handle, not the computation: all clones observe
/// the same memoized outcome.
#[derive(Clone)]
pub struct Thunk(Arc<Cell>);

impl Thunk {
    /// Suspend `compute` until the first force.
    pub fn new(compute: impl FnOnce() -> ValueResult<Value> + Send + 'static) -> Self {
        Self::suspended(Suspension::Compute(Box::new(compute)))
    }

    fn suspended(suspension: Suspension) -> Self {
        Self(Arc::new(Cell {
            state: AtomicUsize::new(STATE_UNFORCED),
            owner: AtomicUsize::new(NO_OWNER),
            suspension: Mutex::new(Some(suspension)),
            outcome: OnceLock::new(),
        }))
    }

    fn settled(outcome: ValueResult<Value>) -> Self {
        Self(Arc::new(Cell {
            state: AtomicUsize::new(STATE_DONE),
            owner: AtomicUsize::new(NO_OWNER),
            suspension: Mutex::new(None),
            outcome: OnceLock::from(outcome),
        }))
    }

    /// A cell that is already forced to `value`.
    pub fn ready(value: Value) -> Self {
        Self::settled(Ok(value))
    }

    /// A cell that is already faulted with `err`.
    pub fn fault(err: ValueError) -> Self {
        Self::settled(Err(err.into_memoized()))
    }

    /// A cell deferring the application of `function` to `arg`.
    pub fn apply(function: Function, arg: Thunk) -> Self {
        Self::suspended(Suspension::Apply { function, arg })
    }

    /// Whether the cell has reached its terminal state (value or fault).
    pub fn is_forced(&self) -> bool {
        self.0.state.load(Ordering::Acquire) == STATE_DONE
    }

    /// The memoized outcome, if any, without forcing.
    pub fn peek(&self) -> Option<ValueResult<Value>> {
        if self.is_forced() {
            self.0.outcome.get().cloned()
        } else {
            None
        }
    }

    /// Whether both handles designate the same cell.
    pub fn ptr_eq(&self, other: &Thunk) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Force the cell, running its computation at most once.
    ///
    /// Concurrent callers either win the race and run the computation, or
    /// wait for the winner and return its outcome. A fault is memoized as
    /// [`ValueError::ForceFault`] and replayed verbatim on every force.
    pub fn force(&self) -> ValueResult<Value> {
        let cell = &*self.0;
        let me = current_forcer();
        let backoff = Backoff::new();

        loop {
            match cell.state.load(Ordering::Acquire) {
                STATE_DONE => {
                    if let Some(outcome) = cell.outcome.get() {
                        return outcome.clone();
                    }
                    backoff.spin();
                }
                STATE_UNFORCED => {
                    if cell
                        .state
                        .compare_exchange(
                            STATE_UNFORCED,
                            STATE_IN_PROGRESS,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                        )
                        .is_ok()
                    {
                        cell.owner.store(me, Ordering::Release);
                        return self.run(me);
                    }
                }
                _ => {
                    if cell.owner.load(Ordering::Acquire) == me {
                        trace!("Cyclic force detected on cell {:p}", cell);
                        return Err(ValueError::CyclicForce);
                    }
                    // Another forcer owns the cell, wait for its outcome
                    backoff.snooze();
                }
            }
        }
    }

    fn run(&self, me: usize) -> ValueResult<Value> {
        let cell = &*self.0;
        let mut guard = ForceGuard { cell, armed: true };

        // Release the lock before running: the suspension may force other cells
        let suspension = cell.suspension.lock().take();
        let outcome = match suspension {
            Some(suspension) => suspension.run().map_err(ValueError::into_memoized),
            None => Err(ValueError::thrown("deferred value lost its computation").into_memoized()),
        };

        match &outcome {
            Ok(_) => trace!("Cell {:p} forced by forcer {}", cell, me),
            Err(err) => trace!("Cell {:p} faulted under forcer {}: {}", cell, me, err),
        }

        guard.armed = false;
        cell.publish(outcome.clone());
        outcome
    }
}

impl Salvage for Thunk {
    fn salvage(&mut self, rubble: &mut Rubble) {
        // A cell shared with another handle keeps its contents
        let Some(cell) = Arc::get_mut(&mut self.0) else {
            return;
        };
        if let Some(Ok(value)) = cell.outcome.take() {
            rubble.push_value(value);
        }
        if let Some(Suspension::Apply { arg, .. }) = cell.suspension.get_mut().take() {
            rubble.push(Debris::Thunk(arg));
        }
    }
}

impl Drop for Thunk {
    fn drop(&mut self) {
        teardown(self);
    }
}

impl From<Value> for Thunk {
    fn from(value: Value) -> Self {
        Thunk::ready(value)
    }
}

impl fmt::Debug for Thunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(Ok(value)) => f.debug_tuple("Thunk").field(&value).finish(),
            Some(Err(err)) => write!(f, "Thunk(<fault: {}>)", err),
            None => write!(f, "Thunk(<unforced>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forces_once_and_memoizes() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let thunk = Thunk::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Int(7))
        });

        assert!(!thunk.is_forced());
        assert!(thunk.peek().is_none());
        assert_eq!(thunk.force().unwrap().as_int().unwrap(), 7);
        assert_eq!(thunk.clone().force().unwrap().as_int().unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(thunk.is_forced());
    }

    #[test]
    fn fault_is_replayed_without_rerunning() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let thunk = Thunk::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ValueError::thrown("nope"))
        });

        let first = thunk.force().unwrap_err();
        let second = thunk.force().unwrap_err();
        assert_eq!(first, second);
        assert_eq!(first.root(), &ValueError::thrown("nope"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn self_reference_is_rejected() {
        let slot: Arc<OnceLock<Thunk>> = Arc::new(OnceLock::new());
        let inner = slot.clone();
        let thunk = Thunk::new(move || match inner.get() {
            Some(me) => me.force(),
            None => Ok(Value::Null),
        });
        let _ = slot.set(thunk.clone());

        let err = thunk.force().unwrap_err();
        assert_eq!(err.root(), &ValueError::CyclicForce);
        // The cycle is the cell's terminal state from now on
        assert_eq!(thunk.force().unwrap_err(), err);
    }

    #[test]
    fn panicking_suspension_settles_as_fault() {
        let thunk = Thunk::new(|| panic!("exploded"));
        let forced = thunk.clone();
        let joined = std::thread::spawn(move || forced.force()).join();
        assert!(joined.is_err());

        let err = thunk.force().unwrap_err();
        assert!(err.root().is_thrown());
    }

    #[test]
    fn long_application_chains_drop_without_overflow() {
        let inc = Function::new(|x| Ok(Value::Int(x.force()?.as_int()? + 1)));
        let mut thunk = Thunk::ready(Value::Int(0));
        for _ in 0..100_000 {
            thunk = Thunk::apply(inc.clone(), thunk);
        }
        assert!(!thunk.is_forced());
        drop(thunk);
    }

    #[test]
    fn shared_cells_survive_a_dropped_handle() {
        let thunk = Thunk::ready(Value::Int(5));
        let other = thunk.clone();
        drop(thunk);
        assert_eq!(other.force().unwrap().as_int().unwrap(), 5);
    }

    #[test]
    fn debug_does_not_force() {
        let thunk = Thunk::new(|| Err(ValueError::thrown("never")));
        assert_eq!(format!("{:?}", thunk), "Thunk(<unforced>)");
        assert!(!thunk.is_forced());
    }
}
