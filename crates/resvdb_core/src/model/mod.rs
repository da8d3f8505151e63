//! In-memory object model for persisted entities.
//!
//! # Responsibility
//! - Define the record payloads exchanged with the persistence layer.
//! - Wrap them in a closed sum type tagged by entity kind.
//!
//! # Invariants
//! - Every persisted object is identified by a stable string primary key.
//! - Objects are owned by callers; persistence never retains them.

pub mod attr;
pub mod object;
pub mod resv;
