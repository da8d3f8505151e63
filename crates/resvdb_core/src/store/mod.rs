//! Schemaless key-value store boundary.
//!
//! # Responsibility
//! - Define the record/operation/query vocabulary the persistence layer speaks.
//! - Hide the concrete backend behind the `KvStore` trait.
//!
//! # Invariants
//! - A multi-operation batch is applied atomically or not at all.
//! - `query_foreach` streams records one at a time and stops as soon as the
//!   callback returns `false`.
//! - Per-call resources (statements, transactions, decoded rows) never outlive
//!   the call that created them.

use rusqlite::Error as SqliteError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;
mod value;

pub use sqlite::SqliteKvStore;
pub use value::{Value, ValueMap};

/// Longest bin name accepted by the store.
pub const MAX_BIN_NAME_LEN: usize = 15;

pub type StoreResult<T> = Result<T, StoreError>;

/// Fully qualified record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub namespace: String,
    /// Entity table ("set") inside the namespace.
    pub set: String,
    pub user_key: String,
}

impl StoreKey {
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            user_key: user_key.into(),
        }
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set, self.user_key)
    }
}

/// One stored record as returned by reads, scans and operate echoes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: StoreKey,
    pub bins: ValueMap,
    /// Write counter, starts at 1 on creation.
    pub generation: u32,
}

impl Record {
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }
}

/// One step of a multi-bin write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Overwrite a bin. Writing `Value::Nil` removes it.
    Write { bin: String, value: Value },
    /// Merge entries into a map bin, creating it when absent. Existing keys
    /// not present in `items` are left untouched.
    MapPutItems { bin: String, items: ValueMap },
}

impl Operation {
    pub fn write(bin: &str, value: impl Into<Value>) -> Self {
        Self::Write {
            bin: bin.to_string(),
            value: value.into(),
        }
    }

    pub fn map_put_items(bin: &str, items: ValueMap) -> Self {
        Self::MapPutItems {
            bin: bin.to_string(),
            items,
        }
    }

    pub fn bin(&self) -> &str {
        match self {
            Self::Write { bin, .. } | Self::MapPutItems { bin, .. } => bin.as_str(),
        }
    }
}

/// How `operate` treats a missing record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordExists {
    /// Create the record when missing, update it otherwise.
    #[default]
    Update,
    /// Fail with `RecordNotFound` when the record is missing.
    UpdateOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WritePolicy {
    pub exists: RecordExists,
}

impl WritePolicy {
    pub fn update_only() -> Self {
        Self {
            exists: RecordExists::UpdateOnly,
        }
    }
}

/// Inclusive integer range filter on one bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    pub bin: String,
    pub begin: i64,
    pub end: i64,
}

/// Full-set scan, optionally restricted by one range filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub namespace: String,
    pub set: String,
    pub filter: Option<RangeFilter>,
}

impl Query {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            filter: None,
        }
    }

    pub fn where_range(mut self, bin: &str, begin: i64, end: i64) -> Self {
        self.filter = Some(RangeFilter {
            bin: bin.to_string(),
            begin,
            end,
        });
        self
    }
}

/// Store-level failure with a stable numeric code.
#[derive(Debug)]
pub enum StoreError {
    /// Key does not exist.
    RecordNotFound(StoreKey),
    /// Caller supplied an unusable key, bin name or batch.
    Parameter(String),
    /// Operation does not apply to the bin's current value type.
    BinIncompatibleType { bin: String, found: &'static str },
    /// Persisted document or schema cannot be decoded.
    Corrupt(String),
    /// Database file was written by a newer schema version.
    SchemaTooNew { found: u32, supported: u32 },
    Backend(SqliteError),
}

impl StoreError {
    /// Numeric status code, stable across releases.
    pub fn code(&self) -> i32 {
        match self {
            Self::Backend(_) => 1,
            Self::RecordNotFound(_) => 2,
            Self::Parameter(_) => 4,
            Self::BinIncompatibleType { .. } => 12,
            Self::Corrupt(_) => 30,
            Self::SchemaTooNew { .. } => 31,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RecordNotFound(key) => write!(f, "record not found: {key}"),
            Self::Parameter(message) => write!(f, "parameter error: {message}"),
            Self::BinIncompatibleType { bin, found } => {
                write!(f, "bin `{bin}` holds incompatible type {found}")
            }
            Self::Corrupt(message) => write!(f, "corrupt record: {message}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "database schema version {found} is newer than supported {supported}"
            ),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SqliteError> for StoreError {
    fn from(value: SqliteError) -> Self {
        Self::Backend(value)
    }
}

/// Blocking key-value store contract.
///
/// Handles are reusable sequentially but carry no internal synchronization.
pub trait KvStore {
    /// Namespace every key produced by this handle lives in.
    fn namespace(&self) -> &str;

    /// Applies `ops` atomically to the record at `key` and echoes the key.
    fn operate(&self, key: &StoreKey, ops: &[Operation], policy: &WritePolicy)
        -> StoreResult<Record>;

    /// Reads the full record at `key`.
    fn get(&self, key: &StoreKey) -> StoreResult<Record>;

    /// Removes the record at `key`.
    fn remove(&self, key: &StoreKey) -> StoreResult<()>;

    /// Streams every record matching `query` into `callback`. Returning
    /// `false` from the callback stops the scan.
    fn query_foreach(
        &self,
        query: &Query,
        callback: &mut dyn FnMut(Record) -> bool,
    ) -> StoreResult<()>;
}

pub(crate) fn validate_bin_name(bin: &str) -> StoreResult<()> {
    if bin.is_empty() || bin.len() > MAX_BIN_NAME_LEN {
        return Err(StoreError::Parameter(format!(
            "bin name `{bin}` must be 1..={MAX_BIN_NAME_LEN} bytes"
        )));
    }
    if !bin
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
    {
        return Err(StoreError::Parameter(format!(
            "bin name `{bin}` contains unsupported characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_key(key: &StoreKey) -> StoreResult<()> {
    if key.namespace.is_empty() || key.set.is_empty() {
        return Err(StoreError::Parameter(
            "namespace and set must not be empty".to_string(),
        ));
    }
    if key.user_key.is_empty() {
        return Err(StoreError::Parameter("user key must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_bin_name, validate_key, StoreError, StoreKey};

    #[test]
    fn bin_names_follow_store_limits() {
        assert!(validate_bin_name("ri_svrflags").is_ok());
        assert!(validate_bin_name("attributes").is_ok());
        assert!(validate_bin_name("").is_err());
        assert!(validate_bin_name("a_very_long_bin_name").is_err());
        assert!(validate_bin_name("bad.bin").is_err());
    }

    #[test]
    fn empty_user_key_is_parameter_error() {
        let err = validate_key(&StoreKey::new("pbs", "resv", "")).unwrap_err();
        assert!(matches!(err, StoreError::Parameter(_)));
        assert_eq!(err.code(), 4);
    }

    #[test]
    fn codes_are_distinct_and_positive() {
        let errors = [
            StoreError::RecordNotFound(StoreKey::new("pbs", "resv", "R1.server")),
            StoreError::Parameter("p".to_string()),
            StoreError::BinIncompatibleType {
                bin: "attributes".to_string(),
                found: "string",
            },
            StoreError::Corrupt("c".to_string()),
            StoreError::SchemaTooNew {
                found: 9,
                supported: 2,
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(StoreError::code).collect();
        assert!(codes.iter().all(|code| *code > 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
