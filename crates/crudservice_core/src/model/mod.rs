//! Entity and transfer-object contracts.
//!
//! # Responsibility
//! - Define the static table mapping every persisted type provides.
//! - Replace runtime accessor lookup with declared relations and the
//!   `AddRelated` capability.
//!
//! # Invariants
//! - Every entity is identified by a value of its `Entity::Id` type.

pub mod dto;
pub mod entity;
