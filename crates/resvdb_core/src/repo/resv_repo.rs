//! Reservation repository contracts and key-value store implementation.
//!
//! # Responsibility
//! - Translate reservation save/load/find/delete use-cases into store batches,
//!   point reads and filtered scans.
//! - Keep bin layout and key construction inside the persistence boundary.
//!
//! # Invariants
//! - Every save batch is built completely (including attribute encoding)
//!   before the store is contacted; encoding failures never cause partial
//!   writes.
//! - `ri_savetm` is stamped from the injected clock on every save.
//! - Load reports `Unchanged` only when save time and record generation both
//!   match the caller's copy.
//! - `ri_creattm` is written only by saves carrying `SaveMode::NEW`.
//! - Attribute saves merge keys; only `delete_resv_attrs` removes attributes.
//! - The scan cursor decodes into one reused buffer whose identity is reset
//!   after every callback.

use crate::clock::{Clock, SYSTEM_CLOCK};
use crate::codec::attr_codec::encode_attrs;
use crate::codec::resv_fields::{
    base_field_writes, decode_resv, stored_savetm, BIN_ATTRIBUTES, BIN_CREATTM, BIN_SAVETM,
};
use crate::codec::CodecError;
use crate::model::object::{DbObject, DbObjectKind};
use crate::model::resv::{ResvInfo, UNSET_INT};
use crate::store::{
    KvStore, Operation, Query, Record, StoreError, StoreKey, Value, WritePolicy,
};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::{BitOr, ControlFlow};
use std::time::Instant;

pub const CTX_SAVE: &str = "Execution of save resv";
pub const CTX_LOAD: &str = "Execution of load resv";
pub const CTX_FIND: &str = "Execution of find resv";
pub const CTX_DELETE: &str = "Execution of delete resv";
pub const CTX_DELETE_ATTRS: &str = "Execution of delete resv attrs";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for reservation persistence.
#[derive(Debug)]
pub enum RepoError {
    /// Object could not be converted to/from store values.
    Codec(CodecError),
    /// The store call itself failed.
    Store {
        context: &'static str,
        call: &'static str,
        source: StoreError,
    },
    /// Save request selected no fields at all.
    EmptySave(String),
}

impl RepoError {
    fn store(context: &'static str, call: &'static str, source: StoreError) -> Self {
        Self::Store {
            context,
            call,
            source,
        }
    }

    /// Operation context suitable for an error sink.
    pub fn context(&self) -> Option<&'static str> {
        match self {
            Self::Store { context, .. } => Some(*context),
            Self::Codec(_) | Self::EmptySave(_) => None,
        }
    }

    /// One-line diagnostic without the context prefix.
    ///
    /// Store failures render as `<call>() returned <code> - <message>`.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::Store { call, source, .. } => {
                format!("{call}() returned {} - {source}", source.code())
            }
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.is_not_found())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Codec(err) => write!(f, "{err}"),
            Self::Store { context, .. } => write!(f, "{context}: {}", self.diagnostic()),
            Self::EmptySave(resvid) => write!(f, "save of resv `{resvid}` selects no fields"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            Self::Store { source, .. } => Some(source),
            Self::EmptySave(_) => None,
        }
    }
}

impl From<CodecError> for RepoError {
    fn from(value: CodecError) -> Self {
        Self::Codec(value)
    }
}

/// Save mode bits.
///
/// `QUICK` writes the base scalar fields, `NEW` marks a first insert. An
/// attribute merge is added whenever the attribute list is non-empty or `NEW`
/// is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SaveMode(u8);

impl SaveMode {
    pub const NONE: Self = Self(0);
    pub const QUICK: Self = Self(0b01);
    pub const NEW: Self = Self(0b10);
    /// Scalars plus whatever attributes the record carries.
    pub const FULL: Self = Self::QUICK;
    pub const INSERT: Self = Self(Self::QUICK.0 | Self::NEW.0);

    const ALL_BITS: u8 = Self::INSERT.0;

    /// Parses raw bits, rejecting unknown ones.
    pub fn from_bits(bits: u8) -> Option<Self> {
        (bits & !Self::ALL_BITS == 0).then_some(Self(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SaveMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Result of a successful load call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Record decoded into the caller's object.
    Loaded,
    /// Stored save timestamp equals the caller's; object left untouched.
    Unchanged,
}

/// Result of a successful find call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindOutcome {
    /// Number of rows handed to the callback.
    Rows(u64),
    NoRows,
}

/// Result of a successful delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Filters for `find_resv`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Only records saved at or after this time (epoch seconds).
    pub timestamp: Option<i64>,
}

impl QueryOptions {
    pub fn since(timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
        }
    }
}

type RowCallback<'a> = Box<dyn FnMut(&DbObject, u64) -> ControlFlow<()> + 'a>;

/// Caller-owned cursor state: the row callback and the running row count.
pub struct QueryState<'a> {
    callback: RowCallback<'a>,
    count: u64,
}

impl<'a> QueryState<'a> {
    /// The callback receives each decoded object and the running count.
    /// Returning `ControlFlow::Break(())` stops the scan.
    pub fn new(callback: impl FnMut(&DbObject, u64) -> ControlFlow<()> + 'a) -> Self {
        Self {
            callback: Box::new(callback),
            count: 0,
        }
    }

    /// Rows delivered by the last find call.
    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Repository interface for reservation persistence.
pub trait ResvRepository {
    fn save_resv(&self, resv: &ResvInfo, mode: SaveMode) -> RepoResult<()>;
    /// Loads the record identified by `resv.resvid` into `resv`.
    fn load_resv(&self, resv: &mut ResvInfo) -> RepoResult<LoadOutcome>;
    fn find_resv(
        &self,
        state: &mut QueryState<'_>,
        options: Option<&QueryOptions>,
    ) -> RepoResult<FindOutcome>;
    fn delete_resv(&self, resvid: &str) -> RepoResult<DeleteOutcome>;
    /// Clears only the attributes of an existing record.
    fn delete_resv_attrs(&self, resvid: &str) -> RepoResult<()>;
}

/// Reservation repository over any `KvStore`.
pub struct KvResvRepository<'s> {
    store: &'s dyn KvStore,
    clock: &'s dyn Clock,
}

impl<'s> KvResvRepository<'s> {
    /// Uses the process-wide system clock.
    pub fn new(store: &'s dyn KvStore) -> Self {
        Self::with_clock(store, &SYSTEM_CLOCK)
    }

    pub fn with_clock(store: &'s dyn KvStore, clock: &'s dyn Clock) -> Self {
        Self { store, clock }
    }

    fn key(&self, resvid: &str) -> StoreKey {
        StoreKey::new(self.store.namespace(), DbObjectKind::Resv.table(), resvid)
    }
}

/// Builds the complete write batch for one save.
///
/// Returns an empty batch when `mode` and the attribute list select nothing.
pub fn build_save_ops(resv: &ResvInfo, mode: SaveMode, now: i64) -> RepoResult<Vec<Operation>> {
    let with_base = mode.contains(SaveMode::QUICK);
    let is_insert = mode.contains(SaveMode::NEW);
    let with_attrs = !resv.attrs.is_empty() || is_insert;

    if !(with_base || is_insert || with_attrs) {
        return Ok(Vec::new());
    }

    // Encode first so a bad attribute aborts before anything is queued.
    let attr_items = if with_attrs {
        Some(encode_attrs(&resv.attrs)?)
    } else {
        None
    };

    let mut ops = Vec::with_capacity(11);
    if with_base {
        ops.extend(base_field_writes(resv));
    }
    ops.push(Operation::write(BIN_SAVETM, now));
    if is_insert {
        ops.push(Operation::write(BIN_CREATTM, now));
    }
    if let Some(items) = attr_items {
        ops.push(Operation::map_put_items(BIN_ATTRIBUTES, items));
    }
    Ok(ops)
}

/// The caller's copy is current only when both the save time and the write
/// counter match; save times have one-second resolution.
fn is_current(resv: &ResvInfo, record: &Record) -> RepoResult<bool> {
    if resv.savetm == UNSET_INT || resv.generation == 0 {
        return Ok(false);
    }
    Ok(resv.generation == record.generation && stored_savetm(record)? == resv.savetm)
}

impl ResvRepository for KvResvRepository<'_> {
    fn save_resv(&self, resv: &ResvInfo, mode: SaveMode) -> RepoResult<()> {
        let started_at = Instant::now();
        let ops = build_save_ops(resv, mode, self.clock.now())?;
        if ops.is_empty() {
            return Err(RepoError::EmptySave(resv.resvid.clone()));
        }

        let echo = self
            .store
            .operate(&self.key(&resv.resvid), &ops, &WritePolicy::default())
            .map_err(|err| {
                warn!(
                    "event=resv_save module=repo status=error mode={} code={} error={}",
                    mode.bits(),
                    err.code(),
                    err
                );
                RepoError::store(CTX_SAVE, "operate", err)
            })?;

        debug!(
            "event=resv_save module=repo status=ok mode={} bins={} generation={} key={} duration_ms={}",
            mode.bits(),
            ops.len(),
            echo.generation,
            echo.key,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn load_resv(&self, resv: &mut ResvInfo) -> RepoResult<LoadOutcome> {
        let record = self
            .store
            .get(&self.key(&resv.resvid))
            .map_err(|err| RepoError::store(CTX_LOAD, "get", err))?;

        if is_current(resv, &record)? {
            debug!(
                "event=resv_load module=repo status=unchanged savetm={} generation={}",
                resv.savetm, resv.generation
            );
            return Ok(LoadOutcome::Unchanged);
        }

        // Decode into a scratch copy so a decode error leaves the caller's
        // object as it was.
        let mut loaded = ResvInfo::for_load(resv.resvid.as_str());
        decode_resv(&record, &mut loaded)?;
        *resv = loaded;
        debug!(
            "event=resv_load module=repo status=ok attrs={} generation={}",
            resv.attrs.len(),
            record.generation
        );
        Ok(LoadOutcome::Loaded)
    }

    fn find_resv(
        &self,
        state: &mut QueryState<'_>,
        options: Option<&QueryOptions>,
    ) -> RepoResult<FindOutcome> {
        let started_at = Instant::now();
        let mut query = Query::new(self.store.namespace(), DbObjectKind::Resv.table());
        if let Some(since) = options.and_then(|options| options.timestamp) {
            query = query.where_range(BIN_SAVETM, since, self.clock.now());
        }

        state.count = 0;
        let mut buffer = DbObject::empty(DbObjectKind::Resv);
        let mut decode_error = None;

        let scanned = self.store.query_foreach(&query, &mut |record| {
            match &mut buffer {
                DbObject::Resv(resv) => {
                    resv.resvid = record.key.user_key.clone();
                    if let Err(err) = decode_resv(&record, resv) {
                        decode_error = Some(err);
                        return false;
                    }
                }
            }
            state.count += 1;
            let flow = (state.callback)(&buffer, state.count);
            buffer.reset();
            flow.is_continue()
        });

        if let Err(err) = scanned {
            warn!(
                "event=resv_find module=repo status=error rows={} code={} error={}",
                state.count,
                err.code(),
                err
            );
            return Err(RepoError::store(CTX_FIND, "query_foreach", err));
        }
        if let Some(err) = decode_error {
            warn!(
                "event=resv_find module=repo status=error rows={} error={}",
                state.count, err
            );
            return Err(err.into());
        }

        debug!(
            "event=resv_find module=repo status=ok filtered={} rows={} duration_ms={}",
            query.filter.is_some(),
            state.count,
            started_at.elapsed().as_millis()
        );
        match state.count {
            0 => Ok(FindOutcome::NoRows),
            rows => Ok(FindOutcome::Rows(rows)),
        }
    }

    fn delete_resv(&self, resvid: &str) -> RepoResult<DeleteOutcome> {
        match self.store.remove(&self.key(resvid)) {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(err) if err.is_not_found() => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(RepoError::store(CTX_DELETE, "remove", err)),
        }
    }

    fn delete_resv_attrs(&self, resvid: &str) -> RepoResult<()> {
        let ops = [Operation::write(BIN_ATTRIBUTES, Value::Nil)];
        self.store
            .operate(&self.key(resvid), &ops, &WritePolicy::update_only())
            .map_err(|err| RepoError::store(CTX_DELETE_ATTRS, "operate", err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{build_save_ops, RepoError, SaveMode};
    use crate::codec::resv_fields::{BIN_ATTRIBUTES, BIN_CREATTM, BIN_SAVETM};
    use crate::model::attr::DbAttr;
    use crate::model::resv::ResvInfo;
    use crate::store::{Operation, StoreError, StoreKey};

    fn bins(ops: &[Operation]) -> Vec<&str> {
        ops.iter().map(Operation::bin).collect()
    }

    #[test]
    fn quick_save_writes_scalars_and_savetm_only() {
        let resv = ResvInfo::new("R1.server", "workq");
        let ops = build_save_ops(&resv, SaveMode::QUICK, 100).unwrap();
        assert_eq!(ops.len(), 9);
        assert_eq!(ops[8], Operation::write(BIN_SAVETM, 100_i64));
        assert!(!bins(&ops).contains(&BIN_CREATTM));
        assert!(!bins(&ops).contains(&BIN_ATTRIBUTES));
    }

    #[test]
    fn insert_adds_creattm_and_attributes_even_when_empty() {
        let resv = ResvInfo::new("R1.server", "workq");
        let ops = build_save_ops(&resv, SaveMode::INSERT, 100).unwrap();
        assert_eq!(ops.len(), 11);
        assert!(bins(&ops).contains(&BIN_CREATTM));
        assert_eq!(ops.last().unwrap().bin(), BIN_ATTRIBUTES);
    }

    #[test]
    fn attributes_only_save_stamps_savetm() {
        let mut resv = ResvInfo::new("R1.server", "workq");
        resv.attrs.push(DbAttr::new("reserve_name", "nightly"));
        let ops = build_save_ops(&resv, SaveMode::NONE, 100).unwrap();
        assert_eq!(bins(&ops), vec![BIN_SAVETM, BIN_ATTRIBUTES]);
    }

    #[test]
    fn nothing_selected_builds_empty_batch() {
        let resv = ResvInfo::new("R1.server", "workq");
        assert!(build_save_ops(&resv, SaveMode::NONE, 100)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn bad_attribute_aborts_batch_construction() {
        let mut resv = ResvInfo::new("R1.server", "workq");
        resv.attrs.push(DbAttr::new("bad.name", "x"));
        let err = build_save_ops(&resv, SaveMode::INSERT, 100).unwrap_err();
        assert!(matches!(err, RepoError::Codec(_)));
    }

    #[test]
    fn save_mode_bits() {
        assert_eq!(SaveMode::QUICK | SaveMode::NEW, SaveMode::INSERT);
        assert!(SaveMode::INSERT.contains(SaveMode::NEW));
        assert!(!SaveMode::FULL.contains(SaveMode::NEW));
        assert_eq!(SaveMode::from_bits(3), Some(SaveMode::INSERT));
        assert_eq!(SaveMode::from_bits(4), None);
    }

    #[test]
    fn store_errors_render_code_and_message() {
        let err = RepoError::Store {
            context: super::CTX_LOAD,
            call: "get",
            source: StoreError::RecordNotFound(StoreKey::new("pbs", "resv", "R9.server")),
        };
        assert_eq!(
            err.diagnostic(),
            "get() returned 2 - record not found: pbs:resv:R9.server"
        );
        assert_eq!(err.context(), Some("Execution of load resv"));
        assert!(err.is_not_found());
    }
}
