//! Purpose: Render values for the display/rendering collaborator.
//! Exports: `render_for_display`.
//! Role: Small, pure formatter; never used on the persistence path.
//! Invariants: Output is infallible — text passes through, null renders empty.

use serde_json::Value;

use crate::api::codec::JsonCodec;
use crate::api::field::Input;

pub fn render_for_display(codec: &JsonCodec, input: &Input) -> String {
    match input {
        Input::Text(text) => text.clone(),
        Input::Value(Value::Null) => String::new(),
        Input::Value(value) => codec.pretty_value(value),
    }
}
