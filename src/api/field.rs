//! Purpose: Base JSON field: nullability, defaults, normalization, storage text.
//! Exports: `Input`, `FieldDefault`, `FieldOptions`, `JsonField`.
//! Role: Structural validator wrapping the codec for the persistence boundary.
//! Invariants: Configuration is immutable once the field is constructed.
//! Invariants: Declared defaults are validated at construction, not first use.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::api::codec::JsonCodec;
use crate::api::fallback::{Datum, FallbackRegistry};
use crate::core::error::{Error, ErrorKind};

/// Raw text or an already-decoded value. The distinction is explicit so a
/// JSON string value is never mistaken for undecoded text.
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Text(String),
    Value(Value),
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(value)
    }
}

#[derive(Clone, Debug)]
pub enum FieldDefault {
    Unset,
    Value(Value),
    Generator(fn() -> Value),
}

#[derive(Clone, Debug)]
pub struct FieldOptions {
    nullable: bool,
    blank: bool,
    default: FieldDefault,
    fallbacks: Arc<FallbackRegistry>,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self {
            nullable: false,
            blank: false,
            default: FieldDefault::Unset,
            fallbacks: Arc::new(FallbackRegistry::with_defaults()),
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_blank(mut self, blank: bool) -> Self {
        self.blank = blank;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = FieldDefault::Value(default);
        self
    }

    pub fn with_default_generator(mut self, generator: fn() -> Value) -> Self {
        self.default = FieldDefault::Generator(generator);
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = Arc::new(fallbacks);
        self
    }
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct JsonField {
    codec: JsonCodec,
    default: FieldDefault,
}

impl JsonField {
    pub fn new(options: FieldOptions) -> Result<Self, Error> {
        let FieldOptions {
            nullable,
            blank,
            default,
            fallbacks,
        } = options;
        // Non-nullable fields without a declared default get an empty mapping.
        let default = match default {
            FieldDefault::Unset if !nullable => FieldDefault::Value(Value::Object(Map::new())),
            other => other,
        };
        let field = Self {
            codec: JsonCodec::new(nullable, blank, fallbacks),
            default,
        };
        field.check_default()?;
        Ok(field)
    }

    fn check_default(&self) -> Result<(), Error> {
        let Some(value) = self.default_value() else {
            return Ok(());
        };
        if let Err(err) = self.validate(&Datum::from(value)) {
            return Err(Error::new(ErrorKind::Validation)
                .with_message("configured default fails validation")
                .with_source(err));
        }
        Ok(())
    }

    /// Structural validation: nullability, then a full encode attempt. Any
    /// shape the codec accepts passes.
    pub fn validate(&self, datum: &Datum) -> Result<(), Error> {
        if datum.is_null() && !self.codec.nullable() {
            return Err(Error::new(ErrorKind::Validation).with_message("null is not allowed for this field"));
        }
        if let Err(err) = self.codec.encode(datum) {
            debug!("value failed to encode during validation");
            return Err(Error::new(ErrorKind::Validation)
                .with_message("value does not encode as JSON")
                .with_value(format!("{datum:?}"))
                .with_source(err));
        }
        Ok(())
    }

    /// Decode raw text; pass decoded values through unchanged. Idempotent.
    pub fn normalize(&self, input: Input) -> Result<Value, Error> {
        match input {
            Input::Text(text) => self.codec.decode(&text).map_err(|err| {
                Error::new(ErrorKind::Validation)
                    .with_message("text input is not valid JSON")
                    .with_value(text)
                    .with_source(err)
            }),
            Input::Value(value) => Ok(value),
        }
    }

    pub fn default_value(&self) -> Option<Value> {
        match &self.default {
            FieldDefault::Unset => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Generator(generator) => Some(generator()),
        }
    }

    pub fn to_storage_text(&self, datum: &Datum) -> Result<String, Error> {
        self.codec.encode(datum)
    }

    pub fn from_storage_text(&self, text: &str) -> Result<Value, Error> {
        self.codec.decode(text)
    }

    pub fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    pub fn nullable(&self) -> bool {
        self.codec.nullable()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldOptions, Input, JsonField};
    use crate::api::fallback::Datum;
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    #[test]
    fn null_fails_validation_unless_nullable() {
        let strict = JsonField::new(FieldOptions::new()).expect("field");
        let err = strict.validate(&Datum::from(Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let relaxed = JsonField::new(FieldOptions::new().with_nullable(true)).expect("field");
        relaxed.validate(&Datum::from(Value::Null)).expect("null ok");
    }

    #[test]
    fn non_nullable_field_defaults_to_empty_mapping() {
        let field = JsonField::new(FieldOptions::new()).expect("field");
        assert_eq!(field.default_value(), Some(json!({})));
    }

    #[test]
    fn nullable_field_has_no_implicit_default() {
        let field = JsonField::new(FieldOptions::new().with_nullable(true)).expect("field");
        assert_eq!(field.default_value(), None);
    }

    #[test]
    fn invalid_default_fails_at_construction() {
        let err = JsonField::new(FieldOptions::new().with_default(Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn generator_default_is_invoked_and_checked() {
        let field =
            JsonField::new(FieldOptions::new().with_default_generator(|| json!([]))).expect("field");
        assert_eq!(field.default_value(), Some(json!([])));

        let err =
            JsonField::new(FieldOptions::new().with_default_generator(|| Value::Null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn normalize_decodes_text_and_passes_values_through() {
        let field = JsonField::new(FieldOptions::new()).expect("field");
        let decoded = field
            .normalize(Input::from(r#"{"a": 1}"#))
            .expect("normalize");
        assert_eq!(decoded, json!({"a": 1}));

        let again = field.normalize(Input::Value(decoded.clone())).expect("normalize");
        assert_eq!(again, decoded);
    }

    #[test]
    fn normalize_wraps_parse_failures_as_validation() {
        let field = JsonField::new(FieldOptions::new()).expect("field");
        let err = field.normalize(Input::from("not json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.value(), Some("not json"));
    }

    #[test]
    fn storage_text_round_trips() {
        let field = JsonField::new(FieldOptions::new()).expect("field");
        let value = json!({"a": 1, "b": [true, null]});
        let text = field.to_storage_text(&Datum::from(value.clone())).expect("encode");
        assert_eq!(field.from_storage_text(&text).expect("decode"), value);
    }
}
