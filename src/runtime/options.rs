//! Option coercion
//!
//! Validates an untyped [`OptionMap`] against a descriptor's option schema and
//! produces a fully populated, typed [`OptionSet`].

use super::descriptor::OptionSpec;
use super::errors::{Error, Result};
use super::variant::{OptionMap, Variant};
use std::fmt;
use tracing::debug;

/// A typed option value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Str(String),
    Int(i64),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            OptionValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            OptionValue::Str(_) => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptionValue::Str(s) => write!(f, "'{}'", s),
            OptionValue::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Per-instance option values, one entry per schema option in schema order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    values: Vec<(String, OptionValue)>,
}

impl OptionSet {
    pub(crate) const EMPTY: OptionSet = OptionSet { values: Vec::new() };

    pub fn get(&self, id: &str) -> Option<&OptionValue> {
        self.values.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(OptionValue::as_str)
    }

    pub fn get_int(&self, id: &str) -> Option<i64> {
        self.get(id).and_then(OptionValue::as_int)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Schema-declared option type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionType {
    Str,
    Int,
}

fn declared_type(spec: &OptionSpec) -> Result<OptionType> {
    match spec.default {
        Variant::Str(_) => Ok(OptionType::Str),
        Variant::I64(_) => Ok(OptionType::Int),
        ref other => Err(Error::arg(format!(
            "options of type {} are not supported (option '{}')",
            other.variant_type(),
            spec.id
        ))),
    }
}

fn typed(spec_type: OptionType, value: &Variant) -> Option<OptionValue> {
    match (spec_type, value) {
        (OptionType::Str, Variant::Str(s)) => Some(OptionValue::Str(s.clone())),
        (OptionType::Int, Variant::I64(v)) => Some(OptionValue::Int(*v)),
        _ => None,
    }
}

/// Coerce `input` against `schema`.
///
/// Every schema entry appears exactly once in the result. Keys that were used
/// are removed from `input`, but only once the whole coercion succeeded; on
/// error `input` is left untouched. Keys unknown to the schema stay in `input`.
pub fn coerce(decoder_id: &str, schema: &[OptionSpec], input: &mut OptionMap) -> Result<OptionSet> {
    if schema.is_empty() {
        if input.is_empty() {
            return Ok(OptionSet::default());
        }
        return Err(Error::arg(format!(
            "protocol decoder '{}' has no options",
            decoder_id
        )));
    }

    let mut values = Vec::new();
    values.try_reserve_exact(schema.len())?;
    let mut consumed = Vec::new();

    for spec in schema {
        let spec_type = declared_type(spec)?;

        let value = match input.get(&spec.id) {
            Some(given) => {
                debug!("got option '{}' = {}", spec.id, given);
                let value = typed(spec_type, given).ok_or_else(|| {
                    Error::arg(match spec_type {
                        OptionType::Str => format!("option '{}' requires a string value", spec.id),
                        OptionType::Int => format!("option '{}' requires an integer value", spec.id),
                    })
                })?;
                consumed.push(spec.id.as_str());
                value
            }
            None => typed(spec_type, &spec.default).ok_or_else(|| {
                Error::Bug(format!("default of option '{}' lost its type", spec.id))
            })?,
        };

        values.push((spec.id.clone(), value));
    }

    for key in consumed {
        input.remove(key);
    }

    Ok(OptionSet { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::errors::ErrorKind;

    fn spec(id: &str, default: impl Into<Variant>) -> OptionSpec {
        OptionSpec {
            id: id.to_string(),
            desc: String::new(),
            default: default.into(),
        }
    }

    fn uart_schema() -> Vec<OptionSpec> {
        vec![spec("baudrate", 115200i64), spec("parity", "none")]
    }

    #[test]
    fn test_uart_override_and_default() {
        let mut input = OptionMap::new();
        input.insert("baudrate".into(), Variant::I64(9600));

        let set = coerce("uart", &uart_schema(), &mut input).unwrap();

        assert_eq!(set.get_int("baudrate"), Some(9600));
        assert_eq!(set.get_str("parity"), Some("none"));
        assert_eq!(set.len(), 2);
        assert!(input.is_empty(), "consumed key must be removed");
    }

    #[test]
    fn test_unknown_keys_left_in_map() {
        let mut input = OptionMap::new();
        input.insert("parity".into(), Variant::from("even"));
        input.insert("samplerate".into(), Variant::U64(1_000_000));

        let set = coerce("uart", &uart_schema(), &mut input).unwrap();

        assert_eq!(set.get_str("parity"), Some("even"));
        assert_eq!(input.len(), 1);
        assert!(input.contains_key("samplerate"));
    }

    #[test]
    fn test_type_mismatch_aborts_and_leaves_input() {
        let mut input = OptionMap::new();
        input.insert("parity".into(), Variant::from("odd"));
        input.insert("baudrate".into(), Variant::from("fast"));

        let err = coerce("uart", &uart_schema(), &mut input).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("requires an integer"));
        assert_eq!(input.len(), 2);
    }

    #[test]
    fn test_int32_is_not_an_integer_option() {
        let mut input = OptionMap::new();
        input.insert("baudrate".into(), Variant::I32(9600));
        assert!(coerce("uart", &uart_schema(), &mut input).is_err());
    }

    #[test]
    fn test_no_schema_rejects_nonempty_input() {
        let mut input = OptionMap::new();
        assert!(coerce("null", &[], &mut input).unwrap().is_empty());

        input.insert("x".into(), Variant::I64(1));
        let err = coerce("null", &[], &mut input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unsupported_schema_type() {
        let schema = vec![spec("invert", true)];
        let mut input = OptionMap::new();
        let err = coerce("x", &schema, &mut input).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_every_schema_key_exactly_once() {
        let schema = vec![spec("a", 1i64), spec("b", "x"), spec("c", 3i64)];
        let mut input = OptionMap::new();
        input.insert("c".into(), Variant::I64(30));

        let set = coerce("x", &schema, &mut input).unwrap();
        let keys: Vec<&str> = set.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(set.get_int("c"), Some(30));
    }
}
