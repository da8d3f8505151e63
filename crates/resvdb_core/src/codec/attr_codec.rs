//! Attribute list <-> store map codec.
//!
//! # Responsibility
//! - Flatten an `AttrList` into one store map suitable for a put-items merge.
//! - Rebuild an `AttrList` from a stored attributes bin.
//!
//! # Invariants
//! - Map key is `name` without a resource and `name.resource` with one, so the
//!   same name under different resources never collides.
//! - Names match `[A-Za-z_][A-Za-z0-9_]*`; decoding splits on the first `.`.
//! - Map value is the list `[value, flags]`.
//! - A missing, nil or cleared bin decodes to an empty list.

use super::{CodecError, CodecResult};
use crate::model::attr::{AttrList, DbAttr};
use crate::store::{Value, ValueMap};
use once_cell::sync::Lazy;
use regex::Regex;

const RESOURCE_SEPARATOR: char = '.';

static ATTR_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid attribute name regex"));

/// Builds the composite map key for one attribute.
pub fn attr_key(name: &str, resource: &str) -> CodecResult<String> {
    if !ATTR_NAME_RE.is_match(name) {
        return Err(CodecError::InvalidAttrName(name.to_string()));
    }
    if resource.chars().any(char::is_control) {
        return Err(CodecError::InvalidResource {
            name: name.to_string(),
            resource: resource.to_string(),
        });
    }

    if resource.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}{RESOURCE_SEPARATOR}{resource}"))
    }
}

/// Splits a composite key back into `(name, resource)`.
pub fn split_attr_key(key: &str) -> (&str, &str) {
    key.split_once(RESOURCE_SEPARATOR).unwrap_or((key, ""))
}

/// Encodes `attrs` into a store map. Later duplicates of a key win.
pub fn encode_attrs(attrs: &AttrList) -> CodecResult<ValueMap> {
    let mut map = ValueMap::new();
    for attr in attrs {
        let key = attr_key(&attr.name, &attr.resource)?;
        map.insert(
            key,
            Value::List(vec![
                Value::Str(attr.value.clone()),
                Value::from(attr.flags),
            ]),
        );
    }
    Ok(map)
}

/// Decodes a stored attributes bin. Output is ordered by composite key.
pub fn decode_attrs(bin: Option<&Value>) -> CodecResult<AttrList> {
    let map = match bin {
        None | Some(Value::Nil) => return Ok(AttrList::new()),
        // Cleared marker written by older clear-attribute paths.
        Some(Value::Str(marker)) if marker.is_empty() => return Ok(AttrList::new()),
        Some(Value::Map(map)) => map,
        Some(other) => {
            return Err(CodecError::FieldType {
                bin: super::resv_fields::BIN_ATTRIBUTES,
                expected: "map",
                found: other.type_name(),
            });
        }
    };

    map.iter()
        .map(|(key, entry)| decode_entry(key, entry))
        .collect()
}

fn decode_entry(key: &str, entry: &Value) -> CodecResult<DbAttr> {
    let malformed = |reason: &str| CodecError::MalformedAttr {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let (name, resource) = split_attr_key(key);
    if name.is_empty() {
        return Err(malformed("empty attribute name"));
    }

    let (value, flags) = match entry {
        Value::List(items) => match items.as_slice() {
            [Value::Str(value), Value::Int(flags)] => (value.clone(), *flags),
            [Value::Str(value)] => (value.clone(), 0),
            _ => return Err(malformed("expected [string, integer]")),
        },
        // Bare string entries carry no flags.
        Value::Str(value) => (value.clone(), 0),
        other => return Err(malformed(other.type_name())),
    };

    let flags = i32::try_from(flags).map_err(|_| malformed("flags out of range"))?;
    Ok(DbAttr::with_resource(name, resource, value).flags(flags))
}

#[cfg(test)]
mod tests {
    use super::{attr_key, decode_attrs, encode_attrs, split_attr_key};
    use crate::codec::CodecError;
    use crate::model::attr::{AttrList, DbAttr};
    use crate::store::{Value, ValueMap};
    use std::collections::HashSet;

    fn triples(attrs: &AttrList) -> HashSet<(String, String, String)> {
        attrs
            .iter()
            .map(|attr| (attr.name.clone(), attr.resource.clone(), attr.value.clone()))
            .collect()
    }

    #[test]
    fn key_composition_keeps_resources_apart() {
        assert_eq!(attr_key("Resource_List", "").unwrap(), "Resource_List");
        assert_eq!(
            attr_key("Resource_List", "ncpus").unwrap(),
            "Resource_List.ncpus"
        );
        assert_ne!(
            attr_key("Resource_List", "ncpus").unwrap(),
            attr_key("Resource_List", "mem").unwrap()
        );
    }

    #[test]
    fn resource_may_contain_separator() {
        let key = attr_key("Resource_List", "host.mem").unwrap();
        assert_eq!(split_attr_key(&key), ("Resource_List", "host.mem"));
    }

    #[test]
    fn round_trip_preserves_triples_regardless_of_order() {
        let attrs: AttrList = vec![
            DbAttr::with_resource("Resource_List", "ncpus", "4"),
            DbAttr::new("reserve_name", "nightly").flags(3),
            DbAttr::with_resource("Resource_List", "mem", "2gb"),
            DbAttr::new("Authorized_Users", "alice@host"),
        ]
        .into_iter()
        .collect();

        let encoded = Value::Map(encode_attrs(&attrs).unwrap());
        let decoded = decode_attrs(Some(&encoded)).unwrap();

        assert_eq!(triples(&decoded), triples(&attrs));
        assert_eq!(decoded.get("reserve_name", "").unwrap().flags, 3);
    }

    #[test]
    fn last_duplicate_wins() {
        let attrs: AttrList = vec![
            DbAttr::with_resource("Resource_List", "ncpus", "2"),
            DbAttr::with_resource("Resource_List", "ncpus", "8"),
        ]
        .into_iter()
        .collect();
        let encoded = encode_attrs(&attrs).unwrap();
        assert_eq!(encoded.len(), 1);
        assert_eq!(
            encoded["Resource_List.ncpus"],
            Value::List(vec![Value::from("8"), Value::Int(0)])
        );
    }

    #[test]
    fn unencodable_names_are_rejected() {
        for name in ["", "bad.name", "1st", "has space"] {
            let attrs: AttrList = vec![DbAttr::new(name, "x")].into_iter().collect();
            let err = encode_attrs(&attrs).unwrap_err();
            assert!(matches!(err, CodecError::InvalidAttrName(_)), "{name}");
        }

        let attrs: AttrList = vec![DbAttr::with_resource("Resource_List", "nc\npus", "1")]
            .into_iter()
            .collect();
        assert!(matches!(
            encode_attrs(&attrs).unwrap_err(),
            CodecError::InvalidResource { .. }
        ));
    }

    #[test]
    fn missing_or_cleared_bin_decodes_empty() {
        assert!(decode_attrs(None).unwrap().is_empty());
        assert!(decode_attrs(Some(&Value::Nil)).unwrap().is_empty());
        assert!(decode_attrs(Some(&Value::from(""))).unwrap().is_empty());
        assert!(decode_attrs(Some(&Value::Map(ValueMap::new())))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_entries_are_reported() {
        let mut map = ValueMap::new();
        map.insert("Resource_List.ncpus".to_string(), Value::Int(4));
        let err = decode_attrs(Some(&Value::Map(map))).unwrap_err();
        assert!(matches!(err, CodecError::MalformedAttr { .. }));

        let err = decode_attrs(Some(&Value::Int(1))).unwrap_err();
        assert!(matches!(err, CodecError::FieldType { .. }));
    }
}
