//! Result extraction.
//!
//! Walks a value tree, forcing everything it reaches, and converts it into a
//! plain [`Extracted`] tree that no longer depends on thunks or on the
//! session's symbol table. Nothing here performs I/O.
use std::collections::BTreeMap;

use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    error::{ValueError, ValueResult},
    session::Session,
    thunk::Thunk,
    value::Value,
};

/// A fully forced value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Extracted {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String {
        content: String,
        context: Vec<String>,
    },
    /// Bindings of the flattened record, ordered by key name.
    Record(BTreeMap<String, Extracted>),
    Sequence(Vec<Extracted>),
    /// Functions have no extractable content.
    Function,
}

/// Deep-force `value` under the limits of `session`.
///
/// The walk keeps its own stack, so the nesting depth is bounded by
/// `max_extract_depth` and not by the thread's stack size.
pub fn extract(value: &Value, session: &Session) -> ValueResult<Extracted> {
    Extractor {
        session,
        limit: session.config().max_extract_depth,
        frames: SmallVec::new(),
        results: SmallVec::new(),
    }
    .run(value)
}

/// Force `thunk` and extract its value.
pub fn extract_thunk(thunk: &Thunk, session: &Session) -> ValueResult<Extracted> {
    extract(&thunk.force()?, session)
}

enum Frame {
    /// Force a cell, then extract its value one level deeper.
    Force { cell: Thunk, depth: usize },
    /// Assemble a record from the last `names.len()` results.
    Record { names: Vec<String> },
    /// Assemble a sequence from the last `len` results.
    Sequence { len: usize },
}

struct Extractor<'a> {
    session: &'a Session,
    limit: usize,
    frames: SmallVec<Frame, 16>,
    results: SmallVec<Extracted, 16>,
}

impl Extractor<'_> {
    fn run(mut self, root: &Value) -> ValueResult<Extracted> {
        self.enter(root, 0)?;

        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::Force { cell, depth } => self.enter(&cell.force()?, depth)?,
                Frame::Record { names } => {
                    let values = self.results.drain(self.results.len() - names.len()..);
                    let fields = names.into_iter().zip(values).collect();
                    self.results.push(Extracted::Record(fields));
                }
                Frame::Sequence { len } => {
                    let items = self.results.drain(self.results.len() - len..).collect();
                    self.results.push(Extracted::Sequence(items));
                }
            }
        }

        debug_assert_eq!(self.results.len(), 1);
        self.results
            .pop()
            .ok_or_else(|| ValueError::thrown("extraction produced no result"))
    }

    /// Extract a scalar right away, or schedule the children of a container.
    fn enter(&mut self, value: &Value, depth: usize) -> ValueResult<()> {
        if depth >= self.limit {
            return Err(ValueError::DepthExceeded { limit: self.limit });
        }

        let scalar = match value {
            Value::Null => Extracted::Null,
            Value::Bool(b) => Extracted::Bool(*b),
            Value::Int(i) => Extracted::Int(*i),
            Value::Float(x) => Extracted::Float(*x),
            Value::String(s) => Extracted::String {
                content: s.as_str().to_string(),
                context: s.markers().map(|m| m.as_str().to_string()).collect(),
            },
            Value::Function(_) => Extracted::Function,
            Value::Record(record) => {
                let symbols = self.session.symbols();
                let names = record.keys().map(|key| symbols.fmt(key).to_string()).collect();
                self.frames.push(Frame::Record { names });
                self.schedule(record.iter().map(|(_, cell)| cell), depth);
                return Ok(());
            }
            Value::Sequence(seq) => {
                self.frames.push(Frame::Sequence { len: seq.len() as usize });
                self.schedule(seq.iter(), depth);
                return Ok(());
            }
        };
        self.results.push(scalar);
        Ok(())
    }

    // Frames pop in reverse, so children are pushed last-first to be forced in order
    fn schedule<'c>(&mut self, cells: impl Iterator<Item = &'c Thunk>, depth: usize) {
        let first = self.frames.len();
        self.frames.extend(cells.map(|cell| Frame::Force {
            cell: cell.clone(),
            depth: depth + 1,
        }));
        self.frames[first..].reverse();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::{config::ValueConfig, record::Record, sequence::Sequence};

    use super::*;

    #[test]
    fn names_are_resolved_and_sorted() {
        let session = Session::default();
        let (z, a) = (session.intern("z"), session.intern("a"));
        let record = Record::from_bindings([
            (z, Thunk::ready(Value::Int(1))),
            (a, Thunk::ready(Value::Bool(true))),
        ])
        .unwrap();

        let Extracted::Record(fields) = extract(&Value::Record(record), &session).unwrap() else {
            panic!("expected a record");
        };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "z"]);
        assert_eq!(fields["z"], Extracted::Int(1));
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let session = Session::new(ValueConfig {
            max_extract_depth: 2,
            ..ValueConfig::default()
        });
        let inner = Sequence::from_values([Value::Int(1)]);
        let outer = Sequence::from_values([Value::Sequence(inner)]);
        assert_eq!(
            extract(&Value::Sequence(outer), &session).unwrap_err(),
            ValueError::DepthExceeded { limit: 2 }
        );
    }

    #[test]
    fn elements_are_forced_in_order() {
        let session = Session::default();
        let order = Arc::new(Mutex::new(Vec::new()));
        let cells: Vec<Thunk> = (0..4)
            .map(|i| {
                let order = order.clone();
                Thunk::new(move || {
                    order.lock().push(i);
                    Ok(Value::Int(i))
                })
            })
            .collect();

        let nested = Sequence::from_values([
            Value::Sequence(Sequence::from_thunks(cells[..2].to_vec())),
            Value::Sequence(Sequence::from_thunks(cells[2..].to_vec())),
        ]);
        assert_eq!(
            extract(&Value::Sequence(nested), &session).unwrap(),
            Extracted::Sequence(vec![
                Extracted::Sequence(vec![Extracted::Int(0), Extracted::Int(1)]),
                Extracted::Sequence(vec![Extracted::Int(2), Extracted::Int(3)]),
            ])
        );
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn first_fault_stops_the_walk() {
        let session = Session::default();
        let seq = Sequence::from_thunks(vec![
            Thunk::ready(Value::Int(1)),
            Thunk::new(|| Err(ValueError::thrown("bad element"))),
            Thunk::new(|| panic!("forced past the first fault")),
        ]);
        let err = extract(&Value::Sequence(seq), &session).unwrap_err();
        assert_eq!(err.root(), &ValueError::thrown("bad element"));
    }
}
