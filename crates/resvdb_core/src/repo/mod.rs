//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity kind.
//! - Isolate store batch/scan details from service orchestration.
//!
//! # Invariants
//! - Repository APIs report soft outcomes (`NotFound`, `NoRows`, `Unchanged`)
//!   as values, and transport/codec failures as `RepoError`.

pub mod resv_repo;
