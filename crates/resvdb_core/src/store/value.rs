//! Store-native value model.
//!
//! # Responsibility
//! - Represent the closed set of value shapes a record bin can hold.
//! - Serialize bins to/from the JSON document persisted by the SQLite backend.
//!
//! # Invariants
//! - `Nil` is never persisted as a top-level bin; writing `Nil` removes the bin.
//! - Integers are signed 64-bit; floating point values are not representable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Associative store value keyed by string.
pub type ValueMap = BTreeMap<String, Value>;

/// One store-native value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit "no value" marker.
    Nil,
    Int(i64),
    Str(String),
    List(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Self::Map(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Value, ValueMap};

    #[test]
    fn bins_serialize_as_plain_json() {
        let mut inner = ValueMap::new();
        inner.insert(
            "Resource_List.ncpus".to_string(),
            Value::List(vec![Value::from("4"), Value::Int(0)]),
        );
        let mut bins = ValueMap::new();
        bins.insert("ri_state".to_string(), Value::Int(2));
        bins.insert("ri_queue".to_string(), Value::from("workq"));
        bins.insert("attributes".to_string(), Value::Map(inner));

        let json = serde_json::to_string(&bins).unwrap();
        assert_eq!(
            json,
            r#"{"attributes":{"Resource_List.ncpus":["4",0]},"ri_queue":"workq","ri_state":2}"#
        );

        let decoded: ValueMap = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, bins);
    }

    #[test]
    fn null_decodes_as_nil() {
        let decoded: Value = serde_json::from_str("null").unwrap();
        assert!(decoded.is_nil());
    }

    #[test]
    fn floats_are_rejected() {
        assert!(serde_json::from_str::<Value>("1.5").is_err());
    }
}
