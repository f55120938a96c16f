//! Iterative destruction of value graphs.
//!
//! Values nest arbitrarily deep (a list of lists of records of ...) and a
//! mapped list keeps its source alive until it is materialised. Letting the
//! compiler-generated drop glue follow those links recurses once per level
//! and overflows the stack long before memory runs out.
//!
//! Instead, the `Drop` impls of [`Thunk`], [`Sequence`] and [`Record`] hand
//! their uniquely owned children to a [`Rubble`] work list and hollow
//! themselves out. The list is then drained in a loop: every popped item is
//! hollowed in turn, so by the time it is actually dropped it owns nothing
//! deep and its own drop is shallow. Shared children (another handle still
//! points at them) are left alone; dropping a shared handle only decrements
//! a reference count.
use smallvec::SmallVec;

use crate::{record::Record, sequence::Sequence, thunk::Thunk, value::Value};

pub(crate) enum Debris {
    Thunk(Thunk),
    Sequence(Sequence),
    Record(Record),
}

/// Work list of owned children waiting to be hollowed.
pub(crate) struct Rubble {
    stack: SmallVec<Debris, 8>,
}

impl Rubble {
    fn new() -> Self {
        Self {
            stack: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, debris: Debris) {
        self.stack.push(debris);
    }

    /// Keep the containers a value owns, drop its leaves right away.
    pub(crate) fn push_value(&mut self, value: Value) {
        match value {
            Value::Sequence(seq) => self.push(Debris::Sequence(seq)),
            Value::Record(record) => self.push(Debris::Record(record)),
            _ => {}
        }
    }

    fn drain(&mut self) {
        while let Some(debris) = self.stack.pop() {
            match debris {
                Debris::Thunk(mut thunk) => thunk.salvage(self),
                Debris::Sequence(mut seq) => seq.salvage(self),
                Debris::Record(mut record) => record.salvage(self),
            }
        }
    }
}

/// A handle that can give up the children it owns exclusively.
pub(crate) trait Salvage {
    /// Move every uniquely owned child into `rubble`, leaving `self` shallow.
    fn salvage(&mut self, rubble: &mut Rubble);
}

/// Drop the graph owned by `item` without recursing.
pub(crate) fn teardown(item: &mut impl Salvage) {
    let mut rubble = Rubble::new();
    item.salvage(&mut rubble);
    rubble.drain();
}
