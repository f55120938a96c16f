//! Strings carrying a provenance context.
//!
//! A [`PString`] pairs fully materialised text with a [`Context`]: the set of
//! opaque [`Marker`]s naming the external artifacts the text depends on.
//! Every operation deriving a string from other strings unions their
//! contexts; no operation drops a marker except [`PString::discard_context`].
//! Equality and hashing look at the text only.
use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use smallvec::SmallVec;

use crate::error::{ValueError, ValueResult};

/// An opaque dependency marker. Only the surrounding system interprets it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(Arc<str>);

impl Marker {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Marker {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical set of markers: sorted, without duplicates.
///
/// The empty set does not allocate, and a union with it is O(1).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Context(Option<Arc<[Marker]>>);

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_markers(markers: impl IntoIterator<Item = Marker>) -> Self {
        let mut markers: Vec<Marker> = markers.into_iter().collect();
        markers.sort();
        markers.dedup();
        Self::from_sorted(markers)
    }

    fn from_sorted(markers: impl IntoIterator<Item = Marker>) -> Self {
        let markers: Arc<[Marker]> = markers.into_iter().collect();
        if markers.is_empty() {
            Self(None)
        } else {
            Self(Some(markers))
        }
    }

    fn as_slice(&self) -> &[Marker] {
        self.0.as_deref().unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> + '_ {
        self.as_slice().iter()
    }

    pub fn contains(&self, marker: &Marker) -> bool {
        self.as_slice().binary_search(marker).is_ok()
    }

    /// Set union, as a linear merge of the two sorted sets.
    pub fn union(&self, other: &Context) -> Context {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let (mut left, mut right) = (self.as_slice(), other.as_slice());
        let mut merged: SmallVec<Marker, 8> = SmallVec::with_capacity(left.len() + right.len());
        while let (Some(a), Some(b)) = (left.first(), right.first()) {
            match a.cmp(b) {
                std::cmp::Ordering::Less => {
                    merged.push(a.clone());
                    left = &left[1..];
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b.clone());
                    right = &right[1..];
                }
                std::cmp::Ordering::Equal => {
                    merged.push(a.clone());
                    left = &left[1..];
                    right = &right[1..];
                }
            }
        }
        merged.extend(left.iter().cloned());
        merged.extend(right.iter().cloned());
        Self::from_sorted(merged)
    }
}

impl FromIterator<Marker> for Context {
    fn from_iter<I: IntoIterator<Item = Marker>>(iter: I) -> Self {
        Self::from_markers(iter)
    }
}

/// Immutable text with a provenance context.
#[derive(Clone)]
pub struct PString {
    content: Arc<str>,
    context: Context,
}

impl PString {
    /// A string without context.
    pub fn literal(text: &str) -> Self {
        Self {
            content: Arc::from(text),
            context: Context::empty(),
        }
    }

    pub fn with_context(text: &str, markers: impl IntoIterator<Item = Marker>) -> Self {
        Self {
            content: Arc::from(text),
            context: Context::from_markers(markers),
        }
    }

    pub fn from_parts(content: impl Into<Arc<str>>, context: Context) -> Self {
        Self {
            content: content.into(),
            context,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Length of the content in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> + '_ {
        self.context.iter()
    }

    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }

    /// The same text without any marker.
    pub fn discard_context(&self) -> Self {
        Self {
            content: self.content.clone(),
            context: Context::empty(),
        }
    }

    /// The same text with `markers` added to its context.
    pub fn append_context(&self, markers: impl IntoIterator<Item = Marker>) -> Self {
        Self {
            content: self.content.clone(),
            context: self.context.union(&Context::from_markers(markers)),
        }
    }

    /// Concatenate contents and union contexts.
    pub fn concat(&self, other: &PString) -> PString {
        let mut content = String::with_capacity(self.len() + other.len());
        content.push_str(&self.content);
        content.push_str(&other.content);
        Self {
            content: content.into(),
            context: self.context.union(&other.context),
        }
    }

    /// Concatenate any number of strings with a single allocation.
    pub fn concat_many<'a>(parts: impl IntoIterator<Item = &'a PString>) -> PString {
        let parts: Vec<&PString> = parts.into_iter().collect();
        let mut content = String::with_capacity(parts.iter().map(|p| p.len()).sum());
        let mut context = Context::empty();
        for part in parts {
            content.push_str(&part.content);
            context = context.union(&part.context);
        }
        Self {
            content: content.into(),
            context,
        }
    }

    /// `len` bytes of the content starting at byte `start`.
    ///
    /// A negative `start` faults with [`ValueError::IndexOutOfRange`]. A start
    /// past the end yields an empty string, `start + len` past the end is
    /// clamped to the end and a negative `len` counts as zero. The whole
    /// context is kept: markers are not attributed to character ranges.
    pub fn substring(&self, start: i64, len: i64) -> ValueResult<PString> {
        if start < 0 {
            return Err(ValueError::IndexOutOfRange {
                index: start,
                len: self.len() as u64,
            });
        }
        let size = self.len();
        let begin = (start as u64).min(size as u64) as usize;
        let end = begin + (len.max(0) as u64).min((size - begin) as u64) as usize;

        let content: Arc<str> =
            if self.content.is_char_boundary(begin) && self.content.is_char_boundary(end) {
                Arc::from(&self.content[begin..end])
            } else {
                Arc::from(String::from_utf8_lossy(&self.content.as_bytes()[begin..end]).as_ref())
            };

        Ok(Self {
            content,
            context: self.context.clone(),
        })
    }
}

impl PartialEq for PString {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

impl Eq for PString {}

impl Hash for PString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.content.hash(state);
    }
}

impl From<&str> for PString {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

impl From<String> for PString {
    fn from(text: String) -> Self {
        Self::from_parts(text, Context::empty())
    }
}

impl fmt::Display for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl fmt::Debug for PString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{:?}", self.content)
        } else {
            write!(f, "{:?} {:?}", self.content, self.context.as_slice())
        }
    }
}
