//! Dynamic attribute list carried by persisted objects.
//!
//! # Responsibility
//! - Hold the variable-length set of `(name, resource, value, flags)` entries
//!   attached to a record.
//!
//! # Invariants
//! - Identity of an entry is the `(name, resource)` pair; an empty resource
//!   means "no resource qualifier".
//! - Order is irrelevant to persistence.

use serde::{Deserialize, Serialize};

/// One dynamic attribute entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DbAttr {
    pub name: String,
    /// Resource qualifier, empty when the attribute is not per-resource.
    pub resource: String,
    pub value: String,
    /// Caller-defined attribute flags, persisted verbatim.
    pub flags: i32,
}

impl DbAttr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: String::new(),
            value: value.into(),
            flags: 0,
        }
    }

    pub fn with_resource(
        name: impl Into<String>,
        resource: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            ..Self::new(name, value)
        }
    }

    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    pub fn has_resource(&self) -> bool {
        !self.resource.is_empty()
    }
}

/// Attribute list of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrList {
    attrs: Vec<DbAttr>,
}

impl AttrList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attr: DbAttr) {
        self.attrs.push(attr);
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn clear(&mut self) {
        self.attrs.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DbAttr> {
        self.attrs.iter()
    }

    /// Finds the entry for `name` + `resource` (empty for none).
    pub fn get(&self, name: &str, resource: &str) -> Option<&DbAttr> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name && attr.resource == resource)
    }
}

impl FromIterator<DbAttr> for AttrList {
    fn from_iter<T: IntoIterator<Item = DbAttr>>(iter: T) -> Self {
        Self {
            attrs: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for AttrList {
    type Item = DbAttr;
    type IntoIter = std::vec::IntoIter<DbAttr>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttrList {
    type Item = &'a DbAttr;
    type IntoIter = std::slice::Iter<'a, DbAttr>;

    fn into_iter(self) -> Self::IntoIter {
        self.attrs.iter()
    }
}
