//! Generic persisted-object wrapper.
//!
//! Callers dispatch on the variant before invoking kind-specific persistence;
//! no runtime type inspection happens below this boundary.

use super::resv::ResvInfo;

/// Entity kinds known to the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbObjectKind {
    Resv,
}

impl DbObjectKind {
    /// Store set ("table") holding this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Resv => "resv",
        }
    }

    /// Human label used in diagnostics (`Execution of save resv`).
    pub fn label(self) -> &'static str {
        match self {
            Self::Resv => "resv",
        }
    }
}

/// Closed sum over persisted entity payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbObject {
    Resv(ResvInfo),
}

impl DbObject {
    pub fn kind(&self) -> DbObjectKind {
        match self {
            Self::Resv(_) => DbObjectKind::Resv,
        }
    }

    /// Creates an empty buffer of the given kind.
    pub fn empty(kind: DbObjectKind) -> Self {
        match kind {
            DbObjectKind::Resv => Self::Resv(ResvInfo::default()),
        }
    }

    /// Primary key of the wrapped record.
    pub fn id(&self) -> &str {
        match self {
            Self::Resv(resv) => resv.resvid.as_str(),
        }
    }

    /// Clears the wrapped record's identity.
    pub fn reset(&mut self) {
        match self {
            Self::Resv(resv) => resv.reset(),
        }
    }

    pub fn as_resv(&self) -> Option<&ResvInfo> {
        match self {
            Self::Resv(resv) => Some(resv),
        }
    }
}

impl From<ResvInfo> for DbObject {
    fn from(value: ResvInfo) -> Self {
        Self::Resv(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DbObject, DbObjectKind};
    use crate::model::resv::ResvInfo;

    #[test]
    fn reset_dispatches_to_payload() {
        let mut obj = DbObject::from(ResvInfo::new("R7.server", "workq"));
        assert_eq!(obj.kind(), DbObjectKind::Resv);
        assert_eq!(obj.id(), "R7.server");
        obj.reset();
        assert_eq!(obj.id(), "");
    }

    #[test]
    fn resv_kind_maps_to_resv_table() {
        assert_eq!(DbObjectKind::Resv.table(), "resv");
        assert!(DbObject::empty(DbObjectKind::Resv).id().is_empty());
    }
}
