//! Purpose: Prepare lookup arguments for the host persistence collaborator.
//! Exports: `LookupKind`, `LookupArg`, `LookupValue`, `prep_lookup`.
//! Role: Canonicalize comparison operands so queries match storage-layer text.
//! Invariants: Equality operands are round-tripped through the codec, never raw.
//! Invariants: Substring matching is defined for mappings only.

use serde_json::Value;

use crate::api::fallback::Datum;
use crate::api::field::JsonField;
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LookupKind {
    Exact,
    IExact,
    In,
    IsNull,
    Contains,
    IContains,
}

#[derive(Debug)]
pub enum LookupArg {
    One(Datum),
    Many(Vec<Datum>),
    Flag(bool),
}

#[derive(Clone, Debug, PartialEq)]
pub enum LookupValue {
    Value(Value),
    Values(Vec<Value>),
    Flag(bool),
    Fragment(String),
}

pub fn prep_lookup(field: &JsonField, kind: LookupKind, arg: LookupArg) -> Result<LookupValue, Error> {
    match (kind, arg) {
        (LookupKind::Exact | LookupKind::IExact, LookupArg::One(datum)) => {
            round_trip(field, &datum).map(LookupValue::Value)
        }
        (LookupKind::In, LookupArg::Many(datums)) => {
            let values = datums
                .iter()
                .map(|datum| round_trip(field, datum))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LookupValue::Values(values))
        }
        (LookupKind::IsNull, LookupArg::Flag(flag)) => Ok(LookupValue::Flag(flag)),
        (LookupKind::Contains | LookupKind::IContains, LookupArg::One(datum)) => {
            contains_lookup(field, &datum)
        }
        (kind, arg) => Err(Error::new(ErrorKind::UnsupportedLookup)
            .with_message(format!("lookup {kind:?} does not accept {}", arg_shape(&arg)))),
    }
}

// Equality comparisons must use the storage-layer canonical form, so the
// operand is encoded and decoded once before the host compares it.
fn round_trip(field: &JsonField, datum: &Datum) -> Result<Value, Error> {
    let encoded = field.to_storage_text(datum)?;
    field.from_storage_text(&encoded)
}

fn contains_lookup(field: &JsonField, datum: &Datum) -> Result<LookupValue, Error> {
    // Sequences are rejected before any other shape handling; no substring
    // semantics are defined for them.
    if datum.is_sequence() {
        return Err(sequence_contains_error());
    }
    let value = field.codec().resolve(datum)?;
    match &value {
        Value::Array(_) => Err(sequence_contains_error()),
        Value::Object(_) => {
            let encoded = field.codec().encode_value(&value);
            let fragment = encoded[1..encoded.len() - 1].to_string();
            Ok(LookupValue::Fragment(fragment))
        }
        _ => {
            let encoded = field.codec().encode_value(&value);
            field.from_storage_text(&encoded).map(LookupValue::Value)
        }
    }
}

fn sequence_contains_error() -> Error {
    Error::new(ErrorKind::UnsupportedLookup)
        .with_message("contains lookup is not supported for sequence values")
}

fn arg_shape(arg: &LookupArg) -> &'static str {
    match arg {
        LookupArg::One(_) => "a single value",
        LookupArg::Many(_) => "a sequence of values",
        LookupArg::Flag(_) => "a flag",
    }
}
