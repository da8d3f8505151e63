//! SQLite bootstrap for the store backend.
//!
//! # Responsibility
//! - Open and configure the SQLite connections that back `SqliteKvStore`.
//! - Bring the `kv_records` schema up to date before any record access.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Bootstrap failures surface as `StoreError`, the same type every store
//!   call returns.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
