//! Reservation use-case service.
//!
//! # Responsibility
//! - Provide named entry points for the save modes and the lifecycle calls.
//! - Drive incremental sync against a caller-held checkpoint.
//!
//! # Invariants
//! - Service APIs never bypass repository contracts.
//! - A sync checkpoint only moves forward.
//! - Sync is at-least-once: records saved exactly at the checkpoint are
//!   delivered again on the next pass.

use crate::model::object::DbObject;
use crate::model::resv::{ResvInfo, UNSET_INT};
use crate::repo::resv_repo::{
    DeleteOutcome, FindOutcome, LoadOutcome, QueryOptions, QueryState, RepoResult,
    ResvRepository, SaveMode,
};
use log::info;
use std::ops::ControlFlow;

/// Incremental-sync position: the newest save timestamp already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCheckpoint {
    since: Option<i64>,
}

impl SyncCheckpoint {
    /// Checkpoint that starts with a full scan.
    pub fn start() -> Self {
        Self::default()
    }

    pub fn at(timestamp: i64) -> Self {
        Self {
            since: Some(timestamp),
        }
    }

    pub fn since(&self) -> Option<i64> {
        self.since
    }

    fn observe(&mut self, savetm: i64) {
        if savetm == UNSET_INT {
            return;
        }
        self.since = Some(self.since.map_or(savetm, |current| current.max(savetm)));
    }
}

/// Use-case service wrapper for reservation persistence.
pub struct ResvService<R: ResvRepository> {
    repo: R,
}

impl<R: ResvRepository> ResvService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// First persistence of a reservation (scalars, create time, attributes).
    pub fn create(&self, resv: &ResvInfo) -> RepoResult<()> {
        self.repo.save_resv(resv, SaveMode::INSERT)
    }

    /// Writes scalars plus only the attributes present on `resv`.
    pub fn update_quick(&self, resv: &ResvInfo) -> RepoResult<()> {
        self.repo.save_resv(resv, SaveMode::QUICK)
    }

    /// Writes scalars and merges the full attribute list carried by `resv`.
    pub fn update_full(&self, resv: &ResvInfo) -> RepoResult<()> {
        self.repo.save_resv(resv, SaveMode::FULL)
    }

    /// Loads one reservation by id.
    pub fn get(&self, resvid: &str) -> RepoResult<ResvInfo> {
        let mut resv = ResvInfo::for_load(resvid);
        self.repo.load_resv(&mut resv)?;
        Ok(resv)
    }

    /// Reloads `resv` unless the stored copy has the same save timestamp.
    pub fn refresh(&self, resv: &mut ResvInfo) -> RepoResult<LoadOutcome> {
        self.repo.load_resv(resv)
    }

    pub fn remove(&self, resvid: &str) -> RepoResult<DeleteOutcome> {
        self.repo.delete_resv(resvid)
    }

    pub fn clear_attributes(&self, resvid: &str) -> RepoResult<()> {
        self.repo.delete_resv_attrs(resvid)
    }

    /// Streams every reservation.
    pub fn for_each(
        &self,
        mut visit: impl FnMut(&ResvInfo) -> ControlFlow<()>,
    ) -> RepoResult<FindOutcome> {
        let mut state = QueryState::new(|obj: &DbObject, _count| match obj {
            DbObject::Resv(resv) => visit(resv),
        });
        self.repo.find_resv(&mut state, None)
    }

    /// Streams reservations saved at or after `checkpoint` and advances the
    /// checkpoint to the newest save timestamp delivered.
    pub fn sync_changed(
        &self,
        checkpoint: &mut SyncCheckpoint,
        mut visit: impl FnMut(&ResvInfo) -> ControlFlow<()>,
    ) -> RepoResult<u64> {
        let options = checkpoint.since.map(QueryOptions::since);
        let mut seen = *checkpoint;
        let outcome = {
            let mut state = QueryState::new(|obj: &DbObject, _count| match obj {
                DbObject::Resv(resv) => {
                    seen.observe(resv.savetm);
                    visit(resv)
                }
            });
            self.repo.find_resv(&mut state, options.as_ref())?
        };

        let delivered = match outcome {
            FindOutcome::Rows(rows) => rows,
            FindOutcome::NoRows => 0,
        };
        *checkpoint = seen;
        info!(
            "event=resv_sync module=service status=ok rows={} checkpoint={:?}",
            delivered,
            checkpoint.since
        );
        Ok(delivered)
    }
}
