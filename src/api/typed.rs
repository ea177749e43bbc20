//! Purpose: Typed field extension: declared sub-type coercion plus value checks.
//! Exports: `Coercer`, `ValueCheck`, `TypedJsonField`.
//! Role: Field-level pipeline stage between decode and encode.
//! Invariants: Boundary order is decode/normalize, coerce, validate, encode.
//! Invariants: Checks abort on the first failure; absent declared fields are skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Number, Value};
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::api::fallback::Datum;
use crate::api::field::{FieldOptions, Input, JsonField};
use crate::core::error::{Error, ErrorKind};

/// Closed set of sub-type converters assignable to declared fields.
#[derive(Clone, Debug)]
pub enum Coercer {
    Integer,
    Float,
    Text,
    Date,
    Custom(fn(&Value) -> Result<Value, Error>),
}

impl Coercer {
    pub fn apply(&self, value: &Value) -> Result<Value, Error> {
        match self {
            Coercer::Integer => coerce_integer(value),
            Coercer::Float => coerce_float(value),
            Coercer::Text => coerce_text(value),
            Coercer::Date => coerce_date(value),
            Coercer::Custom(convert) => convert(value),
        }
    }
}

fn coercion_error(expected: &str, value: &Value) -> Error {
    Error::new(ErrorKind::Validation)
        .with_message(format!("value does not coerce to {expected}"))
        .with_value(value.to_string())
}

fn coerce_integer(value: &Value) -> Result<Value, Error> {
    match value {
        Value::Number(num) if num.is_i64() || num.is_u64() => Ok(value.clone()),
        Value::Number(num) => {
            // Fractional input truncates toward zero.
            let float = num.as_f64().ok_or_else(|| coercion_error("an integer", value))?;
            Ok(Value::from(float as i64))
        }
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| coercion_error("an integer", value)),
        _ => Err(coercion_error("an integer", value)),
    }
}

fn coerce_float(value: &Value) -> Result<Value, Error> {
    let parsed = match value {
        Value::Number(num) => num.as_f64().ok_or_else(|| coercion_error("a float", value))?,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| coercion_error("a float", value))?,
        _ => return Err(coercion_error("a float", value)),
    };
    // NaN and infinities have no JSON representation.
    Number::from_f64(parsed)
        .map(Value::Number)
        .ok_or_else(|| coercion_error("a finite float", value))
}

fn coerce_text(value: &Value) -> Result<Value, Error> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(num) => Ok(Value::String(num.to_string())),
        Value::Bool(val) => Ok(Value::String(
            if *val { "true" } else { "false" }.to_string(),
        )),
        _ => Err(coercion_error("text", value)),
    }
}

fn coerce_date(value: &Value) -> Result<Value, Error> {
    let Value::String(text) = value else {
        return Err(coercion_error("a date", value));
    };
    let trimmed = text.trim();
    if let Ok(ts) = time::OffsetDateTime::parse(trimmed, &Rfc3339) {
        return ts
            .format(&Rfc3339)
            .map(Value::String)
            .map_err(|err| coercion_error("a date", value).with_source(err));
    }
    let format = time::format_description::parse("[year]-[month]-[day]")
        .map_err(|err| coercion_error("a date", value).with_source(err))?;
    let date =
        time::Date::parse(trimmed, &format).map_err(|_| coercion_error("a date", value))?;
    date.format(&format)
        .map(Value::String)
        .map_err(|err| coercion_error("a date", value).with_source(err))
}

/// A labeled predicate run against whole values (or each sequence element).
#[derive(Clone)]
pub struct ValueCheck {
    label: String,
    check: Arc<dyn Fn(&Value) -> Result<(), Error> + Send + Sync>,
}

impl ValueCheck {
    pub fn new(
        label: impl Into<String>,
        check: impl Fn(&Value) -> Result<(), Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(&self, value: &Value) -> Result<(), Error> {
        (self.check)(value)
    }
}

impl fmt::Debug for ValueCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueCheck")
            .field("label", &self.label)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct TypedJsonField {
    base: JsonField,
    coercions: BTreeMap<String, Coercer>,
    checks: Vec<ValueCheck>,
}

impl TypedJsonField {
    pub fn new(
        options: FieldOptions,
        coercions: BTreeMap<String, Coercer>,
        checks: Vec<ValueCheck>,
    ) -> Result<Self, Error> {
        Ok(Self {
            base: JsonField::new(options)?,
            coercions,
            checks,
        })
    }

    pub fn base(&self) -> &JsonField {
        &self.base
    }

    /// Apply declared coercions. Sequences coerce per element; elements (or
    /// the whole value) that are not mappings pass through unchanged.
    pub fn coerce(&self, value: Value) -> Result<Value, Error> {
        match value {
            Value::Array(items) => {
                let coerced = items
                    .into_iter()
                    .map(|item| self.coerce_element(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(coerced))
            }
            other => self.coerce_element(other),
        }
    }

    // Declared fields that are absent stay absent; coercion never fails on
    // a missing key.
    fn coerce_element(&self, value: Value) -> Result<Value, Error> {
        let Value::Object(mut map) = value else {
            return Ok(value);
        };
        for (name, coercer) in &self.coercions {
            let Some(current) = map.get(name) else {
                continue;
            };
            let coerced = coercer.apply(current)?;
            map.insert(name.clone(), coerced);
        }
        Ok(Value::Object(map))
    }

    /// Base structural validation first, then each check in declaration
    /// order, once per element for sequences. The first failure aborts.
    pub fn validate(&self, datum: &Datum) -> Result<(), Error> {
        self.base.validate(datum)?;
        if self.checks.is_empty() {
            return Ok(());
        }
        let value = self.base.codec().resolve(datum)?;
        for check in &self.checks {
            match &value {
                Value::Array(items) => {
                    for item in items {
                        run_check(check, item)?;
                    }
                }
                other => run_check(check, other)?,
            }
        }
        Ok(())
    }

    pub fn normalize(&self, input: Input) -> Result<Value, Error> {
        let value = self.base.normalize(input)?;
        self.coerce(value)
    }

    pub fn from_storage_text(&self, text: &str) -> Result<Value, Error> {
        let value = self.base.from_storage_text(text)?;
        self.coerce(value)
    }

    pub fn to_storage_text(&self, datum: &Datum) -> Result<String, Error> {
        self.base.to_storage_text(datum)
    }
}

fn run_check(check: &ValueCheck, value: &Value) -> Result<(), Error> {
    check.run(value).map_err(|err| {
        debug!(check = check.label(), "typed check failed");
        err
    })
}
