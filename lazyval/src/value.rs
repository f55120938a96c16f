//! Forced values.
//!
//! Every deferred computation eventually produces a [`Value`]. Containers
//! inside a value ([`Record`], [`Sequence`]) hold their elements as
//! [`Thunk`]s, so holding a value never implies that its contents have been
//! evaluated.
use std::{fmt, sync::Arc};

use strum::{EnumDiscriminants, EnumIs};

use crate::{
    error::{ValueError, ValueResult},
    pstring::PString,
    record::Record,
    sequence::Sequence,
    thunk::Thunk,
};

/// An opaque callable supplied by the surrounding evaluator.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(Thunk) -> ValueResult<Value> + Send + Sync>);

impl Function {
    pub fn new(f: impl Fn(Thunk) -> ValueResult<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, arg: Thunk) -> ValueResult<Value> {
        (self.0)(arg)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function>")
    }
}

/// A value in weak head normal form.
#[derive(Debug, Clone, EnumIs, EnumDiscriminants)]
#[strum_discriminants(name(ValueKind), derive(Hash))]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(PString),
    Record(Record),
    Sequence(Sequence),
    Function(Function),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Record => "record",
            ValueKind::Sequence => "sequence",
            ValueKind::Function => "function",
        };
        f.write_str(name)
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        self.into()
    }

    fn mismatch(&self, expected: ValueKind) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self) -> ValueResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch(ValueKind::Bool)),
        }
    }

    pub fn as_int(&self) -> ValueResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch(ValueKind::Int)),
        }
    }

    pub fn as_float(&self) -> ValueResult<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch(ValueKind::Float)),
        }
    }

    pub fn as_string(&self) -> ValueResult<&PString> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::String)),
        }
    }

    pub fn as_record(&self) -> ValueResult<&Record> {
        match self {
            Value::Record(r) => Ok(r),
            other => Err(other.mismatch(ValueKind::Record)),
        }
    }

    pub fn as_sequence(&self) -> ValueResult<&Sequence> {
        match self {
            Value::Sequence(s) => Ok(s),
            other => Err(other.mismatch(ValueKind::Sequence)),
        }
    }

    pub fn as_function(&self) -> ValueResult<&Function> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(other.mismatch(ValueKind::Function)),
        }
    }

    /// The record update operator: keys of `overlay` win over keys of `self`.
    ///
    /// Faults with [`ValueError::TypeMismatch`] unless both sides are records.
    #[doc(alias = "override")]
    pub fn update(&self, overlay: &Value) -> ValueResult<Value> {
        let base = self.as_record()?;
        let overlay = overlay.as_record()?;
        Ok(Value::Record(base.update(overlay)))
    }

    /// Concatenate two sequences or two strings.
    pub fn concat(&self, other: &Value) -> ValueResult<Value> {
        match self {
            Value::Sequence(a) => Ok(Value::Sequence(a.concat(other.as_sequence()?))),
            Value::String(a) => Ok(Value::String(a.concat(other.as_string()?))),
            other => Err(other.mismatch(ValueKind::Sequence)),
        }
    }

    /// Structural equality, forcing both operands as deep as needed.
    ///
    /// Strings compare by content only, integers and floats compare
    /// numerically, and functions are never equal to anything.
    pub fn equals(&self, other: &Value) -> ValueResult<bool> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::Int(a), Value::Int(b)) => Ok(a == b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Ok(self.as_float()? == other.as_float()?)
            }
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::Sequence(a), Value::Sequence(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.force()?.equals(&y.force()?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Record(a), Value::Record(b)) => {
                let (a, b) = (a.flatten(), b.flatten());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if ka != kb || !va.force()?.equals(&vb.force()?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(PString::literal(s))
    }
}

impl From<PString> for Value {
    fn from(s: PString) -> Self {
        Value::String(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl From<Sequence> for Value {
    fn from(s: Sequence) -> Self {
        Value::Sequence(s)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}
