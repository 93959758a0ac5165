//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the generic data access contract used by services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Nothing is cached; every call reads or writes the store.

pub mod entity_repo;
