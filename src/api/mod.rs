//! Purpose: Define the stable public Rust API boundary for marlite.
//! Exports: Codec, field, coercion, lookup, and display types.
//! Role: Public, additive-only surface; hides internal parsing modules.
//! Invariants: This module is the only public path to the pipeline types.
//! Invariants: Internal modules remain private and are not directly exposed.

mod codec;
mod display;
mod fallback;
mod field;
mod lookup;
mod typed;

pub use crate::core::error::{Error, ErrorKind};
pub use codec::JsonCodec;
pub use display::render_for_display;
pub use fallback::{Datum, FallbackRegistry, FallbackRule};
pub use field::{FieldDefault, FieldOptions, Input, JsonField};
pub use lookup::{LookupArg, LookupKind, LookupValue, prep_lookup};
pub use typed::{Coercer, TypedJsonField, ValueCheck};
