//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and mapper calls into CRUD-level APIs.
//! - Keep callers decoupled from storage details.

pub mod crud_service;
