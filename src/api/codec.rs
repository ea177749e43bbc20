//! Purpose: Convert between storage text and in-memory JSON values.
//! Exports: `JsonCodec`.
//! Role: Canonical encode/decode seam used by fields and the persistence boundary.
//! Invariants: Canonical text separates items with ", " and keys with ": ".
//! Invariants: Pretty output equals serde_json::to_string_pretty for native values.
//! Invariants: Null/blank policy is fixed at construction and applied on both directions.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::api::fallback::{Datum, FallbackRegistry};
use crate::core::error::{Error, ErrorKind};
use crate::json::parse;

const INDENT: &str = "  ";

#[derive(Clone, Debug)]
pub struct JsonCodec {
    nullable: bool,
    blank: bool,
    fallbacks: Arc<FallbackRegistry>,
}

impl JsonCodec {
    pub fn new(nullable: bool, blank: bool, fallbacks: Arc<FallbackRegistry>) -> Self {
        Self {
            nullable,
            blank,
            fallbacks,
        }
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn blank(&self) -> bool {
        self.blank
    }

    /// Parse storage text into a native value. Empty input is governed by
    /// the null/blank policy; anything else must be well-formed JSON.
    pub fn decode(&self, text: &str) -> Result<Value, Error> {
        if text.is_empty() {
            if self.nullable {
                return Ok(Value::Null);
            }
            if self.blank {
                return Ok(Value::String(String::new()));
            }
            // Fall through: the parser rejects empty input.
        }
        parse::from_str(text).map_err(|err| {
            debug!(len = text.len(), "json decode failed");
            Error::new(ErrorKind::Parse)
                .with_message("malformed JSON text")
                .with_value(text)
                .with_source(err)
        })
    }

    /// Resolve a datum's foreign leaves into a native value without
    /// serializing it.
    pub fn resolve(&self, datum: &Datum) -> Result<Value, Error> {
        self.fallbacks.resolve(datum)
    }

    pub fn encode(&self, datum: &Datum) -> Result<String, Error> {
        if datum.is_null() {
            return Ok(self.null_text().to_string());
        }
        let value = self.fallbacks.resolve(datum)?;
        Ok(write_canonical(&value))
    }

    /// Infallible encoding for values already inside the native union.
    pub fn encode_value(&self, value: &Value) -> String {
        if value.is_null() {
            return self.null_text().to_string();
        }
        write_canonical(value)
    }

    pub fn pretty(&self, datum: &Datum) -> Result<String, Error> {
        let value = self.fallbacks.resolve(datum)?;
        Ok(write_pretty(&value))
    }

    pub fn pretty_value(&self, value: &Value) -> String {
        write_pretty(value)
    }

    // Null text policy: blank-allowed-but-not-null fields store the empty
    // string; every other configuration stores the JSON null sentinel.
    fn null_text(&self) -> &'static str {
        if !self.nullable && self.blank { "" } else { "null" }
    }
}

fn write_canonical(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, 0, false, &mut out);
    out
}

fn write_pretty(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, 0, true, &mut out);
    out
}

fn write_value(value: &Value, indent: usize, pretty: bool, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(val) => out.push_str(if *val { "true" } else { "false" }),
        Value::Number(num) => out.push_str(&num.to_string()),
        Value::String(text) => push_string(text, out),
        Value::Array(items) => write_array(items, indent, pretty, out),
        Value::Object(map) => write_object(map, indent, pretty, out),
    }
}

fn write_array(items: &[Value], indent: usize, pretty: bool, out: &mut String) {
    if items.is_empty() {
        out.push_str("[]");
        return;
    }
    out.push('[');
    if pretty {
        out.push('\n');
    }
    for (idx, item) in items.iter().enumerate() {
        if pretty {
            push_indent(indent + 1, out);
        }
        write_value(item, indent + 1, pretty, out);
        if idx + 1 < items.len() {
            out.push(',');
            if !pretty {
                out.push(' ');
            }
        }
        if pretty {
            out.push('\n');
        }
    }
    if pretty {
        push_indent(indent, out);
    }
    out.push(']');
}

fn write_object(map: &serde_json::Map<String, Value>, indent: usize, pretty: bool, out: &mut String) {
    if map.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push('{');
    if pretty {
        out.push('\n');
    }
    let len = map.len();
    for (idx, (key, value)) in map.iter().enumerate() {
        if pretty {
            push_indent(indent + 1, out);
        }
        push_string(key, out);
        out.push(':');
        out.push(' ');
        write_value(value, indent + 1, pretty, out);
        if idx + 1 < len {
            out.push(',');
            if !pretty {
                out.push(' ');
            }
        }
        if pretty {
            out.push('\n');
        }
    }
    if pretty {
        push_indent(indent, out);
    }
    out.push('}');
}

fn push_string(text: &str, out: &mut String) {
    let encoded = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    out.push_str(&encoded);
}

fn push_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}
