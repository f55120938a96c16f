//! Persistent value model for a lazy, purely functional evaluator.
//!
//! Every evaluated expression reduces to a [`Value`]. Containers are
//! immutable and persistent, and they hold their contents as deferred
//! [`Thunk`]s, so building or combining a container never evaluates what is
//! inside it:
//!
//! - [`Record`]: keys sorted and resolved up front, values lazy. The update
//!   operator stacks layers in O(1) and flattens chains past a fixed depth.
//! - [`Sequence`]: cons list with an O(1) cached length, shared tails and
//!   lazily materialised spines for `map`/`generate`.
//! - [`PString`]: fully materialised text plus a canonical set of provenance
//!   markers that every derived string carries forward.
//!
//! Parsing, evaluation proper, string coercion of records and any I/O belong
//! to the surrounding evaluator, which talks to this crate through
//! [`RecordBuilder`], [`Coercion`] and [`extract`].
//!
//! ```
//! use lazyval::{PString, Record, Sequence, Session, Thunk, Value};
//!
//! let session = Session::default();
//! let a = session.intern("a");
//!
//! let base = Record::from_bindings([(a, Thunk::ready(Value::Int(1)))]).unwrap();
//! let overlay = Record::from_bindings([(a, Thunk::ready(Value::Int(2)))]).unwrap();
//! let merged = base.update(&overlay);
//! assert_eq!(merged.get(a).unwrap().unwrap().as_int().unwrap(), 2);
//! assert_eq!(merged.len(), 1);
//!
//! let list = Sequence::from_values([Value::Int(1), Value::Int(2), Value::Int(3)])
//!     .concat(&Sequence::from_values([Value::Int(4), Value::Int(5)]));
//! assert_eq!(list.len(), 5);
//! assert_eq!(list.nth(3).unwrap().force().unwrap().as_int().unwrap(), 4);
//!
//! let s = PString::literal("ab").concat(&PString::literal("cd"));
//! assert_eq!(s.as_str(), "abcd");
//! assert!(!s.has_context());
//! ```

pub mod coerce;
pub mod config;
pub mod error;
pub mod extract;
pub mod pstring;
pub mod record;
pub mod sequence;
pub mod session;
pub mod symbol;
mod teardown;
pub mod thunk;
pub mod value;

pub use coerce::Coercion;
pub use config::ValueConfig;
pub use error::{ValueError, ValueResult};
pub use extract::{Extracted, extract};
pub use pstring::{Context, Marker, PString};
pub use record::{Record, RecordBuilder, SelfRef};
pub use sequence::Sequence;
pub use session::Session;
pub use symbol::{Symbol, SymbolTable};
pub use thunk::Thunk;
pub use value::{Function, Value, ValueKind};
