use std::sync::Arc;

use strum::EnumIs;
use thiserror::Error;

use crate::value::ValueKind;

/// Every fault the value model can surface to its caller.
///
/// Faults are plain values: they are cloned when a memoized cell replays
/// them and compared by the callers that need to know whether two racing
/// forces observed the same terminal state.
#[derive(Debug, Clone, PartialEq, EnumIs, Error)]
pub enum ValueError {
    /// `head`/`tail` on an empty sequence.
    #[error("Cannot take the head or tail of an empty sequence.")]
    EmptySequence,

    /// Positional access outside of `[0, len)`.
    #[error("Index {index} is out of range for a value of length {len}.")]
    IndexOutOfRange { index: i64, len: u64 },

    /// A deferred value whose own force path attempted to force itself.
    #[error("Infinite recursion encountered: a deferred value depends on itself.")]
    CyclicForce,

    /// An operation was applied to a value of the wrong kind.
    #[error("Expected a value of kind `{expected}`, but found `{found}`.")]
    TypeMismatch {
        expected: ValueKind,
        found: ValueKind,
    },

    /// A fault memoized by the first force of a cell, replayed on every force.
    #[error("{0}")]
    ForceFault(Arc<ValueError>),

    /// A fault raised by the deferred computation itself.
    #[error("Evaluation aborted: {message}")]
    Thrown { message: String },

    /// A literal record binds the same key more than once.
    #[error("Attribute `{key}` is defined more than once in the same record.")]
    DuplicateKey { key: String },

    /// Deep extraction descended further than the configured limit.
    #[error("Value nesting exceeds the extraction limit of {limit} levels.")]
    DepthExceeded { limit: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ValueError {
    /// Build a fault carrying a user-facing message, as raised by `throw`-like constructs.
    pub fn thrown(message: impl Into<String>) -> Self {
        ValueError::Thrown {
            message: message.into(),
        }
    }

    /// Wrap `self` into the memoized form stored by a cell.
    ///
    /// A fault that is already memoized is returned untouched so nested
    /// cells do not stack `ForceFault` layers on each other.
    pub fn into_memoized(self) -> Self {
        match self {
            ValueError::ForceFault(_) => self,
            other => ValueError::ForceFault(Arc::new(other)),
        }
    }

    /// The fault as originally raised, looking through memoization.
    pub fn root(&self) -> &ValueError {
        match self {
            ValueError::ForceFault(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<std::io::Error> for ValueError {
    fn from(err: std::io::Error) -> Self {
        ValueError::Io(err.to_string())
    }
}

pub type ValueResult<T> = Result<T, ValueError>;
