//! Generic CRUD use-case service.
//!
//! # Responsibility
//! - Provide lookup, filtered query, create, partial update, attach and
//!   delete entry points over any `Entity`.
//! - Convert transfer objects through a `Mapper` before persistence.
//!
//! # Invariants
//! - Id-keyed operations report absence as `ServiceError::ResourceNotFound`.
//! - `update` never clears a field the DTO leaves null, and never moves the
//!   entity to another identifier.
//! - Other failures propagate unchanged from repository and mapper.

use crate::mapper::json_mapper::{JsonMapper, Mapper};
use crate::mapper::overlay::copy_non_null_properties;
use crate::mapper::MapError;
use crate::model::dto::Dto;
use crate::model::entity::{AddRelated, Entity, RelationError};
use crate::query::page::{Page, PageRequest};
use crate::query::specification::Specification;
use crate::repo::entity_repo::{RepoError, Repository};
use log::info;
use rusqlite::types::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for CRUD use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// No entity exists for the requested identifier.
    ResourceNotFound { entity: &'static str, id: String },
    /// Entity/DTO conversion failure.
    Mapping(MapError),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResourceNotFound { entity, id } => {
                write!(f, "resource not found: {entity} id={id}")
            }
            Self::Mapping(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ResourceNotFound { .. } => None,
            Self::Mapping(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::ResourceNotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<RelationError> for ServiceError {
    fn from(value: RelationError) -> Self {
        Self::Repo(RepoError::Relation(value))
    }
}

impl From<MapError> for ServiceError {
    fn from(value: MapError) -> Self {
        Self::Mapping(value)
    }
}

/// CRUD facade over one repository and one mapper.
pub struct CrudService<E, R, M = JsonMapper>
where
    E: Entity,
    R: Repository<E>,
    M: Mapper<E>,
{
    repo: R,
    mapper: M,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> CrudService<E, R, JsonMapper>
where
    E: Entity + Serialize + DeserializeOwned,
    R: Repository<E>,
{
    /// Creates a service using the convention-based JSON mapper.
    pub fn new(repo: R) -> Self {
        Self::with_mapper(repo, JsonMapper)
    }
}

impl<E, R, M> CrudService<E, R, M>
where
    E: Entity + Serialize + DeserializeOwned,
    R: Repository<E>,
    M: Mapper<E>,
{
    pub fn with_mapper(repo: R, mapper: M) -> Self {
        Self {
            repo,
            mapper,
            _entity: PhantomData,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Returns every entity, unpaged.
    pub fn get_all(&self) -> ServiceResult<Vec<E>> {
        Ok(self.repo.find_all()?)
    }

    /// Returns one zero-based page of all entities.
    pub fn get_page(&self, page: u32, size: u32) -> ServiceResult<Page<E>> {
        let request = PageRequest::of(page, size)?;
        Ok(self.repo.find_page(request)?)
    }

    /// Returns one zero-based page of the entities matching `spec`.
    pub fn get_page_matching(
        &self,
        page: u32,
        size: u32,
        spec: &Specification,
    ) -> ServiceResult<Page<E>> {
        let request = PageRequest::of(page, size)?;
        Ok(self.repo.find_page_matching(spec, request)?)
    }

    pub fn get_all_matching(&self, spec: &Specification) -> ServiceResult<Vec<E>> {
        Ok(self.repo.find_all_matching(spec)?)
    }

    /// Entities whose `column` equals `value`, or is NULL for `Value::Null`.
    pub fn get_by_column(&self, column: &str, value: impl Into<Value>) -> ServiceResult<Vec<E>> {
        let spec = Specification::column_equals(column, value);
        Ok(self.repo.find_all_matching(&spec)?)
    }

    /// Entities matching every `(column, value)` pair; empty input matches all.
    pub fn get_by_columns<K, V>(
        &self,
        columns: impl IntoIterator<Item = (K, V)>,
    ) -> ServiceResult<Vec<E>>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let spec = Specification::columns_equal(columns);
        Ok(self.repo.find_all_matching(&spec)?)
    }

    pub fn get_by_id(&self, id: &E::Id) -> ServiceResult<E> {
        self.repo
            .find_by_id(id)?
            .ok_or_else(|| Self::not_found(id))
    }

    /// Looks up one entity and converts it to `D`.
    pub fn get_by_id_dto<D>(&self, id: &E::Id) -> ServiceResult<D>
    where
        D: Dto + DeserializeOwned,
    {
        let entity = self.get_by_id(id)?;
        Ok(self.mapper.to_dto(&entity)?)
    }

    pub fn exists_by_id(&self, id: &E::Id) -> ServiceResult<bool> {
        Ok(self.repo.exists_by_id(id)?)
    }

    pub fn count(&self) -> ServiceResult<u64> {
        Ok(self.repo.count()?)
    }

    pub fn count_matching(&self, spec: &Specification) -> ServiceResult<u64> {
        Ok(self.repo.count_matching(spec)?)
    }

    /// Maps `dto` to a new entity and persists it.
    ///
    /// Returns the stored entity, including a store-generated identifier.
    pub fn create<D: Dto>(&self, dto: &D) -> ServiceResult<E> {
        let entity = self.mapper.to_entity(dto)?;
        Ok(self.repo.save(&entity)?)
    }

    /// Overlays the non-null fields of `dto` onto the stored entity.
    pub fn update<D: Dto>(&self, id: &E::Id, dto: &D) -> ServiceResult<E> {
        let mut entity = self.get_by_id(id)?;
        copy_non_null_properties(dto, &mut entity)?;
        entity.set_id(id.clone());
        Ok(self.repo.save(&entity)?)
    }

    /// Inserts or merges a fully formed entity.
    pub fn save(&self, entity: &E) -> ServiceResult<E> {
        Ok(self.repo.save(entity)?)
    }

    /// Adds `item` to the relation named `resource` and persists the entity.
    ///
    /// The relation's current items are loaded first, so earlier items are
    /// kept. The returned entity has the relation loaded.
    pub fn attach<I>(&self, id: &E::Id, resource: &str, item: I) -> ServiceResult<E>
    where
        E: AddRelated<I>,
    {
        let mut entity = self.get_by_id(id)?;
        self.repo.load_relation(&mut entity, resource)?;
        entity.add_related(resource, item)?;
        let saved = self.repo.save(&entity)?;
        info!(
            "event=entity_attach module=service status=ok table={} id={} relation={}",
            E::TABLE,
            id,
            resource
        );
        Ok(saved)
    }

    pub fn delete(&self, id: &E::Id) -> ServiceResult<()> {
        if !self.repo.exists_by_id(id)? {
            return Err(Self::not_found(id));
        }
        Ok(self.repo.delete_by_id(id)?)
    }

    /// Starts an equality/null query that can eagerly load relations.
    pub fn query(&self, column: &str, value: impl Into<Value>) -> QueryBuilder<'_, E, R> {
        QueryBuilder::new(&self.repo, Specification::column_equals(column, value))
    }

    /// Starts a query over an arbitrary specification.
    pub fn query_matching(&self, spec: Specification) -> QueryBuilder<'_, E, R> {
        QueryBuilder::new(&self.repo, spec)
    }

    fn not_found(id: &E::Id) -> ServiceError {
        ServiceError::ResourceNotFound {
            entity: E::TABLE,
            id: id.to_string(),
        }
    }
}

/// Filter plus fetch plan, consumed by `fetch`.
pub struct QueryBuilder<'s, E: Entity, R: Repository<E>> {
    repo: &'s R,
    spec: Specification,
    relations: Vec<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<'s, E: Entity, R: Repository<E>> QueryBuilder<'s, E, R> {
    pub fn new(repo: &'s R, spec: Specification) -> Self {
        Self {
            repo,
            spec,
            relations: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Adds relations to load alongside every result.
    pub fn with<S: Into<String>>(mut self, relations: impl IntoIterator<Item = S>) -> Self {
        self.relations
            .extend(relations.into_iter().map(Into::into));
        self
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Runs the query.
    ///
    /// # Errors
    /// - `RelationError::UnknownRelation` (as `ServiceError::Repo`) when a
    ///   requested relation is not declared by the entity.
    pub fn fetch(self) -> ServiceResult<Vec<E>> {
        Ok(self.repo.find_all_with(&self.spec, &self.relations)?)
    }
}
