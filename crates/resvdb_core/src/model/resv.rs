//! Reservation record model.
//!
//! # Responsibility
//! - Define the in-memory shape of a persisted reservation.
//! - Provide the identity reset used between cursor iterations.
//!
//! # Invariants
//! - `resvid` is the sole identity and never changes for a stored record.
//! - Integer fields equal to `UNSET_INT` were absent in the store.
//! - `savetm`, `creattm` and `generation` are set by persistence, never by
//!   callers.

use super::attr::AttrList;
use serde::{Deserialize, Serialize};

/// Sentinel for integer fields missing from the store.
pub const UNSET_INT: i64 = i64::MAX;

/// One reservation (scheduling window) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResvInfo {
    pub resvid: String,
    pub queue: String,
    pub state: i64,
    pub substate: i64,
    /// Window start, epoch seconds.
    pub stime: i64,
    /// Window end, epoch seconds.
    pub etime: i64,
    pub duration: i64,
    /// Time the reservation became active.
    pub tactive: i64,
    pub svrflags: i64,
    /// Last successful save, stamped by the save path.
    pub savetm: i64,
    /// First insert time, stamped once.
    pub creattm: i64,
    /// Store write counter seen by the last load, 0 when never loaded.
    #[serde(default)]
    pub generation: u32,
    pub attrs: AttrList,
}

impl ResvInfo {
    /// Creates an unsaved record with zeroed scalars and unknown timestamps.
    pub fn new(resvid: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            resvid: resvid.into(),
            queue: queue.into(),
            state: 0,
            substate: 0,
            stime: 0,
            etime: 0,
            duration: 0,
            tactive: 0,
            svrflags: 0,
            savetm: UNSET_INT,
            creattm: UNSET_INT,
            generation: 0,
            attrs: AttrList::new(),
        }
    }

    /// Creates a load target: only the identity is meaningful.
    pub fn for_load(resvid: impl Into<String>) -> Self {
        Self::new(resvid, "")
    }

    /// Clears identity so a reused buffer cannot pass for loaded data.
    pub fn reset(&mut self) {
        self.resvid.clear();
    }

    pub fn is_reset(&self) -> bool {
        self.resvid.is_empty()
    }
}

impl Default for ResvInfo {
    fn default() -> Self {
        Self::new("", "")
    }
}
