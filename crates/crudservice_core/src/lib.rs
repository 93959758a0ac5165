//! Generic CRUD data access over SQLite.
//! Entities declare their table mapping; services add DTO mapping,
//! partial updates and relation attachment on top of one repository.

pub mod db;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use db::{
    open_db, open_db_in_memory, open_db_in_memory_with, open_db_with, DbError, DbOptions,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use mapper::json_mapper::{JsonMapper, Mapper};
pub use mapper::overlay::{copy_non_null_properties, copy_properties};
pub use mapper::{MapError, MapResult};
pub use model::dto::Dto;
pub use model::entity::{AddRelated, Entity, Relation, RelationError, RelationResult};
pub use query::page::{Page, PageRequest};
pub use query::specification::{Comparison, Specification};
pub use repo::entity_repo::{RepoError, RepoResult, Repository, SqliteRepository};
pub use service::crud_service::{CrudService, QueryBuilder, ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
