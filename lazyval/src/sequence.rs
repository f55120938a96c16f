//! Immutable cons lists with a cached length.
//!
//! Every spine node records the length of the list it starts, so `len` is
//! O(1) and never looks at an element. Elements are [`Thunk`]s and are never
//! forced by the list itself.
//!
//! Some spines are produced lazily ([`Sequence::map`], [`Sequence::generate`]):
//! their length is known up front while each node is materialised, once, the
//! first time a traversal reaches it. Tails are shared between lists and the
//! structure is acyclic by construction.
use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use parking_lot::Mutex;

use crate::{
    error::{ValueError, ValueResult},
    teardown::{Debris, Rubble, Salvage, teardown},
    thunk::Thunk,
    value::{Function, Value},
};

struct Cons {
    head: Thunk,
    tail: Sequence,
}

/// Recipe of a spine node that has not been materialised yet.
enum Pending {
    /// `function` applied to every element of a non-empty `source`.
    Map { source: Sequence, function: Function },
    /// `function` applied to the indices `index..index + len`.
    Generate { index: u64, function: Function },
}

struct Node {
    len: u64,
    cons: OnceLock<Cons>,
    // Taken by the single initialiser of `cons`
    pending: Mutex<Option<Pending>>,
}

impl Node {
    fn materialize(&self) -> Cons {
        let pending = self.pending.lock().take();
        match pending {
            Some(Pending::Map { source, function }) => {
                let cons = source
                    .uncons()
                    .expect("mapped spine shares the length of its non-empty source");
                Cons {
                    head: Thunk::apply(function.clone(), cons.head.clone()),
                    tail: cons.tail.map(&function),
                }
            }
            Some(Pending::Generate { index, function }) => Cons {
                head: Thunk::apply(function.clone(), Thunk::ready(Value::Int(index as i64))),
                tail: Sequence::generate_from(index + 1, self.len - 1, &function),
            },
            None => unreachable!("spine node has neither a cons cell nor a recipe"),
        }
    }
}

/// An immutable list of deferred values.
#[derive(Clone, Default)]
pub struct Sequence {
    spine: Option<Arc<Node>>,
}

impl Sequence {
    /// The empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(len: u64, pending: Pending) -> Self {
        if len == 0 {
            return Self::new();
        }
        Self {
            spine: Some(Arc::new(Node {
                len,
                cons: OnceLock::new(),
                pending: Mutex::new(Some(pending)),
            })),
        }
    }

    /// Prepend `head` to `tail`, sharing `tail`.
    pub fn cons(head: Thunk, tail: Sequence) -> Self {
        Self {
            spine: Some(Arc::new(Node {
                len: tail.len() + 1,
                cons: OnceLock::from(Cons { head, tail }),
                pending: Mutex::new(None),
            })),
        }
    }

    pub fn from_thunks(elements: Vec<Thunk>) -> Self {
        elements
            .into_iter()
            .rev()
            .fold(Self::new(), |tail, head| Self::cons(head, tail))
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self::from_thunks(values.into_iter().map(Thunk::ready).collect())
    }

    /// `[f 0, f 1, ..., f (len - 1)]`, with both the spine and the elements deferred.
    pub fn generate(len: u64, function: Function) -> Self {
        Self::generate_from(0, len, &function)
    }

    fn generate_from(index: u64, len: u64, function: &Function) -> Self {
        Self::pending(
            len,
            Pending::Generate {
                index,
                function: function.clone(),
            },
        )
    }

    /// Number of elements. Never forces anything.
    pub fn len(&self) -> u64 {
        self.spine.as_ref().map_or(0, |node| node.len)
    }

    pub fn is_empty(&self) -> bool {
        self.spine.is_none()
    }

    fn uncons(&self) -> Option<&Cons> {
        let node = self.spine.as_deref()?;
        Some(node.cons.get_or_init(|| node.materialize()))
    }

    pub fn head(&self) -> ValueResult<Thunk> {
        self.uncons()
            .map(|cons| cons.head.clone())
            .ok_or(ValueError::EmptySequence)
    }

    pub fn tail(&self) -> ValueResult<Sequence> {
        self.uncons()
            .map(|cons| cons.tail.clone())
            .ok_or(ValueError::EmptySequence)
    }

    /// The element at `index`, walking the spine without forcing elements.
    pub fn nth(&self, index: i64) -> ValueResult<Thunk> {
        let len = self.len();
        if index < 0 || index as u64 >= len {
            return Err(ValueError::IndexOutOfRange { index, len });
        }
        self.iter()
            .nth(index as usize)
            .cloned()
            .ok_or(ValueError::IndexOutOfRange { index, len })
    }

    /// Iterate over the element cells in order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { cursor: self }
    }

    /// `self ++ other`. Copies the spine of `self` and shares `other` as is.
    pub fn concat(&self, other: &Sequence) -> Sequence {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let heads: Vec<Thunk> = self.iter().cloned().collect();
        heads
            .into_iter()
            .rev()
            .fold(other.clone(), |tail, head| Self::cons(head, tail))
    }

    /// Concatenate many lists; the last one is shared, not copied.
    pub fn concat_many(lists: impl IntoIterator<Item = Sequence>) -> Sequence {
        let lists: Vec<Sequence> = lists.into_iter().collect();
        lists
            .into_iter()
            .rev()
            .fold(Self::new(), |acc, list| list.concat(&acc))
    }

    /// A list whose elements defer `function` applied to the elements of `self`.
    ///
    /// O(1): the spine is materialised as it is traversed.
    pub fn map(&self, function: &Function) -> Sequence {
        Self::pending(
            self.len(),
            Pending::Map {
                source: self.clone(),
                function: function.clone(),
            },
        )
    }

    /// Keep the elements for which `predicate` returns `true`.
    ///
    /// Unlike every other operation on lists this forces elements: the
    /// predicate usually needs the element to decide. A predicate that does
    /// not return a boolean faults with [`ValueError::TypeMismatch`].
    pub fn filter(&self, predicate: &Function) -> ValueResult<Sequence> {
        let mut kept = Vec::new();
        for element in self.iter() {
            if predicate.call(element.clone())?.as_bool()? {
                kept.push(element.clone());
            }
        }
        if kept.len() as u64 == self.len() {
            return Ok(self.clone());
        }
        Ok(Self::from_thunks(kept))
    }

    /// Force every element in order, stopping at the first fault.
    pub fn force_all(&self) -> ValueResult<Vec<Value>> {
        self.iter().map(Thunk::force).collect()
    }

    /// Whether both handles designate the same spine.
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        match (&self.spine, &other.spine) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Salvage for Sequence {
    fn salvage(&mut self, rubble: &mut Rubble) {
        // Unlink uniquely owned nodes one by one instead of recursing down the tail
        let mut next = self.spine.take();
        while let Some(node) = next {
            let Some(mut node) = Arc::into_inner(node) else {
                break;
            };
            if let Some(Pending::Map { source, .. }) = node.pending.get_mut().take() {
                rubble.push(Debris::Sequence(source));
            }
            next = node.cons.take().and_then(|Cons { mut head, mut tail }| {
                head.salvage(rubble);
                tail.spine.take()
            });
        }
    }
}

impl Drop for Sequence {
    fn drop(&mut self) {
        teardown(self);
    }
}

impl FromIterator<Thunk> for Sequence {
    fn from_iter<I: IntoIterator<Item = Thunk>>(iter: I) -> Self {
        Self::from_thunks(iter.into_iter().collect())
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the element cells of a [`Sequence`].
pub struct Iter<'a> {
    cursor: &'a Sequence,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Thunk;

    fn next(&mut self) -> Option<Self::Item> {
        let cons = self.cursor.uncons()?;
        self.cursor = &cons.tail;
        Some(&cons.head)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.cursor.len() as usize;
        (len, Some(len))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Thunk;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
