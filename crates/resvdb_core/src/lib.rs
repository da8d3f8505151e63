//! Reservation persistence over a schemaless key-value store.
//! This crate owns the bin layout, the attribute encoding and every save/load
//! invariant; entry points only wire it up.

pub mod clock;
pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock, SYSTEM_CLOCK};
pub use codec::{CodecError, CodecResult};
pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::attr::{AttrList, DbAttr};
pub use model::object::{DbObject, DbObjectKind};
pub use model::resv::{ResvInfo, UNSET_INT};
pub use repo::resv_repo::{
    DeleteOutcome, FindOutcome, KvResvRepository, LoadOutcome, QueryOptions, QueryState,
    RepoError, RepoResult, ResvRepository, SaveMode,
};
pub use service::resv_service::{ResvService, SyncCheckpoint};
pub use store::{KvStore, SqliteKvStore, StoreError, StoreKey, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
