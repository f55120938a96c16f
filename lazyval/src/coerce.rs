//! Boundary with the evaluator's string coercion.
//!
//! Turning a record into a string (for instance through a conversion
//! attribute) is the evaluator's business. The value model only defines the
//! hook and makes sure whatever the hook returns goes through the same
//! context-union rule as any other string.
use crate::{
    error::{ValueError, ValueResult},
    pstring::PString,
    record::Record,
    thunk::Thunk,
    value::{Value, ValueKind},
};

/// String conversion of records, implemented by the surrounding evaluator.
pub trait Coercion {
    fn coerce_record(&self, record: &Record) -> ValueResult<PString>;
}

impl<F> Coercion for F
where
    F: Fn(&Record) -> ValueResult<PString>,
{
    fn coerce_record(&self, record: &Record) -> ValueResult<PString> {
        self(record)
    }
}

impl PString {
    /// Coerce a forced value to a string.
    ///
    /// Strings are returned as is, records go through `hook`, anything else
    /// faults with [`ValueError::TypeMismatch`].
    pub fn coerce(value: &Value, hook: &dyn Coercion) -> ValueResult<PString> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Record(record) => hook.coerce_record(record),
            other => Err(ValueError::TypeMismatch {
                expected: ValueKind::String,
                found: other.kind(),
            }),
        }
    }

    /// Force, coerce and concatenate `parts` in order, as string interpolation does.
    pub fn interpolate(parts: &[Thunk], hook: &dyn Coercion) -> ValueResult<PString> {
        let coerced = parts
            .iter()
            .map(|part| Self::coerce(&part.force()?, hook))
            .collect::<ValueResult<Vec<_>>>()?;
        Ok(Self::concat_many(&coerced))
    }
}
