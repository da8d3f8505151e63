//! Return-code API over the reservation repository.
//!
//! # Responsibility
//! - Dispatch generic object calls to the kind-specific repository.
//! - Map typed outcomes onto the stable integer codes callers compare against.
//! - Forward every failure to the connection's error sink.
//!
//! # Invariants
//! - Functions never panic and never return a code outside the `DB_*` set.
//! - Every `DB_FAILURE` is preceded by exactly one sink report.

use log::warn;
use resvdb_core::repo::resv_repo::{CTX_DELETE, CTX_DELETE_ATTRS, CTX_FIND, CTX_LOAD, CTX_SAVE};
use resvdb_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, Clock, DbObject,
    DbObjectKind, DeleteOutcome, FindOutcome, KvResvRepository, KvStore, LoadOutcome,
    QueryOptions, QueryState, RepoError, ResvRepository, SaveMode, SYSTEM_CLOCK,
};
use std::cell::RefCell;

pub const DB_OK: i32 = 0;
pub const DB_FAILURE: i32 = -1;
/// Find matched nothing, or delete removed nothing.
pub const DB_NO_ROWS: i32 = 1;
/// Load found the caller's copy already current.
pub const DB_UNCHANGED: i32 = -2;

/// Save-type bit: write the base scalar fields.
pub const SAVE_QS: i32 = 1;
/// Save-type bit: first insert, stamps the create time.
pub const SAVE_NEW: i32 = 2;

/// Receiver for failure diagnostics.
pub trait ErrorSink {
    fn report(&self, context: &str, message: &str, detail: Option<&str>);
}

/// One failure captured by `LastErrorSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub context: String,
    pub message: String,
    pub detail: Option<String>,
}

/// Sink keeping only the most recent failure, like a per-connection error
/// buffer.
#[derive(Debug, Default)]
pub struct LastErrorSink {
    last: RefCell<Option<ReportedError>>,
}

impl LastErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<ReportedError> {
        self.last.borrow().clone()
    }

    pub fn take(&self) -> Option<ReportedError> {
        self.last.borrow_mut().take()
    }
}

impl ErrorSink for LastErrorSink {
    fn report(&self, context: &str, message: &str, detail: Option<&str>) {
        *self.last.borrow_mut() = Some(ReportedError {
            context: context.to_string(),
            message: message.to_string(),
            detail: detail.map(str::to_string),
        });
    }
}

/// Caller-owned connection bundle: store handle, clock and error sink.
pub struct DbConn<'a> {
    store: &'a dyn KvStore,
    clock: &'a dyn Clock,
    sink: &'a dyn ErrorSink,
}

impl<'a> DbConn<'a> {
    pub fn new(store: &'a dyn KvStore, sink: &'a dyn ErrorSink) -> Self {
        Self::with_clock(store, &SYSTEM_CLOCK, sink)
    }

    pub fn with_clock(
        store: &'a dyn KvStore,
        clock: &'a dyn Clock,
        sink: &'a dyn ErrorSink,
    ) -> Self {
        Self { store, clock, sink }
    }

    fn resv_repo(&self) -> KvResvRepository<'a> {
        KvResvRepository::with_clock(self.store, self.clock)
    }

    fn fail(&self, default_context: &'static str, err: &RepoError) -> i32 {
        let context = err.context().unwrap_or(default_context);
        let message = err.diagnostic();
        warn!(
            "event=api_failure module=api status=error context=\"{}\"",
            context
        );
        self.sink.report(context, &message, None);
        DB_FAILURE
    }
}

/// Returns the core crate version.
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes core logging; returns an empty string on success and the error
/// message otherwise.
pub fn init_logging(level: &str, log_dir: &str) -> String {
    match init_logging_inner(level, log_dir) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Saves `obj` with the `SAVE_*` bits in `savetype`.
pub fn save_obj(conn: &DbConn<'_>, obj: &DbObject, savetype: i32) -> i32 {
    let Some(mode) = u8::try_from(savetype).ok().and_then(SaveMode::from_bits) else {
        conn.sink
            .report(CTX_SAVE, &format!("unsupported save type {savetype}"), None);
        return DB_FAILURE;
    };

    let result = match obj {
        DbObject::Resv(resv) => conn.resv_repo().save_resv(resv, mode),
    };
    match result {
        Ok(()) => DB_OK,
        Err(err) => conn.fail(CTX_SAVE, &err),
    }
}

/// Loads the object identified by `obj`'s id into `obj`.
pub fn load_obj(conn: &DbConn<'_>, obj: &mut DbObject) -> i32 {
    let result = match obj {
        DbObject::Resv(resv) => conn.resv_repo().load_resv(resv),
    };
    match result {
        Ok(LoadOutcome::Loaded) => DB_OK,
        Ok(LoadOutcome::Unchanged) => DB_UNCHANGED,
        Err(err) => conn.fail(CTX_LOAD, &err),
    }
}

/// Streams every stored object of `kind` into `state`'s callback.
pub fn find_obj(
    conn: &DbConn<'_>,
    state: &mut QueryState<'_>,
    kind: DbObjectKind,
    options: Option<&QueryOptions>,
) -> i32 {
    let result = match kind {
        DbObjectKind::Resv => conn.resv_repo().find_resv(state, options),
    };
    match result {
        Ok(FindOutcome::Rows(_)) => DB_OK,
        Ok(FindOutcome::NoRows) => DB_NO_ROWS,
        Err(err) => conn.fail(CTX_FIND, &err),
    }
}

pub fn delete_obj(conn: &DbConn<'_>, obj: &DbObject) -> i32 {
    let result = match obj {
        DbObject::Resv(resv) => conn.resv_repo().delete_resv(&resv.resvid),
    };
    match result {
        Ok(DeleteOutcome::Deleted) => DB_OK,
        Ok(DeleteOutcome::NotFound) => DB_NO_ROWS,
        Err(err) => conn.fail(CTX_DELETE, &err),
    }
}

/// Clears every attribute of the stored object `id`, keeping its scalars.
pub fn delete_attrs_obj(conn: &DbConn<'_>, kind: DbObjectKind, id: &str) -> i32 {
    let result = match kind {
        DbObjectKind::Resv => conn.resv_repo().delete_resv_attrs(id),
    };
    match result {
        Ok(()) => DB_OK,
        Err(err) => conn.fail(CTX_DELETE_ATTRS, &err),
    }
}

/// Clears `obj`'s identity so it cannot pass for loaded data.
pub fn reset_obj(obj: &mut DbObject) {
    obj.reset();
}

#[cfg(test)]
mod tests {
    use super::{ErrorSink, LastErrorSink, ReportedError};

    #[test]
    fn last_error_sink_keeps_most_recent_report() {
        let sink = LastErrorSink::new();
        assert!(sink.last().is_none());

        sink.report("Execution of save resv", "first", None);
        sink.report("Execution of load resv", "second", Some("detail"));

        assert_eq!(
            sink.take(),
            Some(ReportedError {
                context: "Execution of load resv".to_string(),
                message: "second".to_string(),
                detail: Some("detail".to_string()),
            })
        );
        assert!(sink.last().is_none());
    }

    #[test]
    fn init_logging_reports_errors_as_text() {
        assert!(!super::init_logging("verbose", "/tmp/resvdb-logs").is_empty());
        assert!(!super::init_logging("info", "relative/logs").is_empty());
    }
}
