//! Purpose: Represent encode-side values that may carry non-JSON leaves.
//! Exports: `Datum`, `FallbackRule`, `FallbackRegistry`.
//! Role: Ordered converter registry consulted when the codec meets a foreign leaf.
//! Invariants: Rule order is fixed at construction; the first matching rule wins.
//! Invariants: Registries are immutable once built and shared read-only.

use std::any::Any;
use std::fmt;

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::core::error::{Error, ErrorKind};

type AnyLeaf = dyn Any + Send + Sync;

/// A value headed for the encoder. Pure JSON subtrees ride along unchanged;
/// anything the JSON model cannot represent natively enters as a `Foreign`
/// leaf and is converted through the fallback registry at encode time.
pub enum Datum {
    Value(Value),
    Array(Vec<Datum>),
    Object(Vec<(String, Datum)>),
    Foreign {
        type_name: &'static str,
        value: Box<AnyLeaf>,
    },
}

impl Datum {
    pub fn foreign<T: Any + Send + Sync>(value: T) -> Self {
        Datum::Foreign {
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Value(Value::Null))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Datum::Array(_) | Datum::Value(Value::Array(_)))
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Value(value) => fmt::Debug::fmt(value, f),
            Datum::Array(items) => f.debug_list().entries(items).finish(),
            Datum::Object(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(key, value)| (key, value)))
                .finish(),
            Datum::Foreign { type_name, .. } => write!(f, "<foreign {type_name}>"),
        }
    }
}

/// One (predicate, converter) pair. Predicates inspect the leaf without
/// consuming it; converters produce the native JSON replacement.
pub struct FallbackRule {
    name: &'static str,
    matches: Box<dyn Fn(&AnyLeaf) -> bool + Send + Sync>,
    convert: Box<dyn Fn(&AnyLeaf) -> Result<Value, Error> + Send + Sync>,
}

impl FallbackRule {
    pub fn new(
        name: &'static str,
        matches: impl Fn(&AnyLeaf) -> bool + Send + Sync + 'static,
        convert: impl Fn(&AnyLeaf) -> Result<Value, Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            matches: Box::new(matches),
            convert: Box::new(convert),
        }
    }

    /// Rule whose predicate is a downcast check for `T`.
    pub fn for_type<T, F>(name: &'static str, convert: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            name,
            matches: Box::new(|leaf| leaf.is::<T>()),
            convert: Box::new(move |leaf| match leaf.downcast_ref::<T>() {
                Some(typed) => convert(typed),
                None => Err(Error::new(ErrorKind::UnsupportedType)
                    .with_message(format!("fallback rule {name} applied to a non-matching value"))),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for FallbackRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackRule")
            .field("name", &self.name)
            .finish()
    }
}

pub struct FallbackRegistry {
    rules: Vec<FallbackRule>,
}

impl FallbackRegistry {
    pub fn new(rules: Vec<FallbackRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Stock rules covering the `time` crate's value types: timestamps as
    /// RFC 3339, dates as `[year]-[month]-[day]`, clock times as
    /// `[hour]:[minute]:[second]`.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            FallbackRule::for_type::<time::OffsetDateTime, _>("datetime", |ts| {
                ts.format(&Rfc3339).map(Value::String).map_err(|err| {
                    Error::new(ErrorKind::UnsupportedType)
                        .with_message("timestamp does not format as RFC 3339")
                        .with_source(err)
                })
            }),
            FallbackRule::for_type::<time::Date, _>("date", |date| {
                let format = parse_pattern("[year]-[month]-[day]")?;
                date.format(&format).map(Value::String).map_err(format_error)
            }),
            FallbackRule::for_type::<time::Time, _>("time", |clock| {
                let format = parse_pattern("[hour]:[minute]:[second]")?;
                clock
                    .format(&format)
                    .map(Value::String)
                    .map_err(format_error)
            }),
        ])
    }

    /// Walk a datum tree, replacing every foreign leaf with the output of
    /// the first rule whose predicate accepts it.
    pub fn resolve(&self, datum: &Datum) -> Result<Value, Error> {
        match datum {
            Datum::Value(value) => Ok(value.clone()),
            Datum::Array(items) => {
                let resolved = items
                    .iter()
                    .map(|item| self.resolve(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(resolved))
            }
            Datum::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.resolve(value)?);
                }
                Ok(Value::Object(map))
            }
            Datum::Foreign { type_name, value } => self.convert(type_name, value.as_ref()),
        }
    }

    fn convert(&self, type_name: &str, leaf: &AnyLeaf) -> Result<Value, Error> {
        for rule in &self.rules {
            if (rule.matches)(leaf) {
                return (rule.convert)(leaf);
            }
        }
        warn!(type_name, "no fallback converter matched");
        Err(Error::new(ErrorKind::UnsupportedType)
            .with_message(format!("no fallback converter for {type_name}")))
    }
}

impl fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(FallbackRule::name))
            .finish()
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<time::format_description::FormatItem<'_>>, Error> {
    time::format_description::parse(pattern).map_err(|err| {
        Error::new(ErrorKind::UnsupportedType)
            .with_message("invalid date/time format description")
            .with_source(err)
    })
}

fn format_error(err: time::error::Format) -> Error {
    Error::new(ErrorKind::UnsupportedType)
        .with_message("date/time value does not format")
        .with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{Datum, FallbackRegistry, FallbackRule};
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};

    #[test]
    fn first_matching_rule_wins() {
        let registry = FallbackRegistry::new(vec![
            FallbackRule::for_type::<u32, _>("first", |_| Ok(json!("first"))),
            FallbackRule::for_type::<u32, _>("second", |_| Ok(json!("second"))),
        ]);
        let resolved = registry.resolve(&Datum::foreign(7u32)).expect("resolve");
        assert_eq!(resolved, json!("first"));
    }

    #[test]
    fn unmatched_leaf_is_an_unsupported_type() {
        let registry = FallbackRegistry::empty();
        let err = registry.resolve(&Datum::foreign(7u32)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedType);
    }

    #[test]
    fn default_rules_cover_time_values() {
        let registry = FallbackRegistry::with_defaults();

        let epoch = time::OffsetDateTime::from_unix_timestamp(0).expect("epoch");
        assert_eq!(
            registry.resolve(&Datum::foreign(epoch)).expect("datetime"),
            json!("1970-01-01T00:00:00Z")
        );

        let date = time::Date::from_calendar_date(2024, time::Month::March, 5).expect("date");
        assert_eq!(
            registry.resolve(&Datum::foreign(date)).expect("date"),
            json!("2024-03-05")
        );

        let clock = time::Time::from_hms(9, 30, 0).expect("time");
        assert_eq!(
            registry.resolve(&Datum::foreign(clock)).expect("time"),
            json!("09:30:00")
        );
    }

    #[test]
    fn foreign_leaves_resolve_inside_containers() {
        let registry = FallbackRegistry::with_defaults();
        let epoch = time::OffsetDateTime::from_unix_timestamp(0).expect("epoch");
        let datum = Datum::Object(vec![
            ("at".to_string(), Datum::foreign(epoch)),
            ("n".to_string(), Datum::from(json!(1))),
        ]);

        let resolved = registry.resolve(&datum).expect("resolve");
        assert_eq!(resolved, json!({"at": "1970-01-01T00:00:00Z", "n": 1}));
    }

    #[test]
    fn pure_json_resolves_unchanged() {
        let registry = FallbackRegistry::empty();
        let value: Value = json!({"a": [1, 2], "b": null});
        let resolved = registry
            .resolve(&Datum::from(value.clone()))
            .expect("resolve");
        assert_eq!(resolved, value);
    }
}
