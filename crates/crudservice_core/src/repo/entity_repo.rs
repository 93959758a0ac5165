//! Generic entity repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/exists/count/save/delete over any `Entity` table.
//! - Render `Specification` filters and fetch plans into SQL.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every write is followed by a read-back; returned entities mirror rows.
//! - List queries are ordered by identifier so pages partition the result.
//! - Relations whose items are not loaded are never written.
//! - `save` and `delete_by_id` run inside one savepoint; a failure leaves
//!   entity and link rows as they were.
//! - Column names are not validated here; unknown names fail in SQLite.

use crate::db::DbError;
use crate::model::entity::{find_relation, Entity, Relation, RelationError};
use crate::query::page::{Page, PageRequest};
use crate::query::quote_identifier;
use crate::query::specification::Specification;
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::time::Instant;

const WRITE_SAVEPOINT: &str = "crud_write";
/// Owner ids bound per link query; stays under SQLite's variable limit.
const LINK_BATCH_SIZE: usize = 500;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No row with this identifier exists in the entity table.
    NotFound { entity: &'static str, id: String },
    /// Page size must be at least one.
    InvalidPageRequest { page: u32, size: u32 },
    InvalidData(String),
    Relation(RelationError),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// A write succeeded but its read-back did not.
    InconsistentState(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidPageRequest { page, size } => {
                write!(f, "invalid page request: page={page} size={size}")
            }
            Self::InvalidData(message) => write!(f, "invalid entity data: {message}"),
            Self::Relation(err) => write!(f, "{err}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Relation(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidPageRequest { .. } => None,
            Self::InvalidData(_) => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InconsistentState(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<RelationError> for RepoError {
    fn from(value: RelationError) -> Self {
        Self::Relation(value)
    }
}

/// Persistence contract for one entity type.
pub trait Repository<E: Entity> {
    fn find_by_id(&self, id: &E::Id) -> RepoResult<Option<E>>;

    /// Every entity matching `spec`.
    fn find_all_matching(&self, spec: &Specification) -> RepoResult<Vec<E>>;

    /// One page of the entities matching `spec`.
    fn find_page_matching(
        &self,
        spec: &Specification,
        request: PageRequest,
    ) -> RepoResult<Page<E>>;

    /// Entities matching `spec` with the named relations loaded.
    fn find_all_with(&self, spec: &Specification, relations: &[String]) -> RepoResult<Vec<E>>;

    /// Loads the current items of one relation into `entity`.
    fn load_relation(&self, entity: &mut E, relation: &str) -> RepoResult<()>;

    fn exists_by_id(&self, id: &E::Id) -> RepoResult<bool>;

    fn count_matching(&self, spec: &Specification) -> RepoResult<u64>;

    /// Inserts or merges `entity` and returns the stored state.
    fn save(&self, entity: &E) -> RepoResult<E>;

    /// Removes the row and its relation links.
    ///
    /// Returns `RepoError::NotFound` when no row matches.
    fn delete_by_id(&self, id: &E::Id) -> RepoResult<()>;

    fn find_all(&self) -> RepoResult<Vec<E>> {
        self.find_all_matching(&Specification::All)
    }

    fn find_page(&self, request: PageRequest) -> RepoResult<Page<E>> {
        self.find_page_matching(&Specification::All, request)
    }

    fn count(&self) -> RepoResult<u64> {
        self.count_matching(&Specification::All)
    }
}

/// SQLite-backed repository for entity type `E`.
pub struct SqliteRepository<'conn, E: Entity> {
    conn: &'conn Connection,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteRepository<'conn, E> {
    /// Constructs a repository after checking the entity's tables and columns.
    ///
    /// # Errors
    /// - `MissingRequiredTable` when the entity table or a link table is absent.
    /// - `MissingRequiredColumn` when a declared column is absent.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_entity_schema::<E>(conn)?;
        Ok(Self {
            conn,
            _entity: PhantomData,
        })
    }

    /// Runs `write` inside a savepoint, rolling back every statement on error.
    ///
    /// Savepoints nest, so this also works inside a caller's transaction.
    fn in_savepoint<T>(&self, write: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {WRITE_SAVEPOINT};"))?;

        let result = write().and_then(|value| {
            self.conn
                .execute_batch(&format!("RELEASE {WRITE_SAVEPOINT};"))?;
            Ok(value)
        });

        if result.is_err() {
            if let Err(rollback_err) = self.conn.execute_batch(&format!(
                "ROLLBACK TO {WRITE_SAVEPOINT}; RELEASE {WRITE_SAVEPOINT};"
            )) {
                error!(
                    "event=write_rollback module=repo status=error table={} error={}",
                    E::TABLE,
                    rollback_err
                );
            }
        }

        result
    }

    fn select_sql() -> String {
        let mut columns = vec![quote_identifier(E::ID_COLUMN)];
        columns.extend(E::COLUMNS.iter().map(|column| quote_identifier(column)));
        format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            quote_identifier(E::TABLE)
        )
    }

    fn query_entities(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<E>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row)?);
        }

        Ok(entities)
    }

    fn save_inner(&self, entity: &E) -> RepoResult<(E, &'static str)> {
        let values = entity.column_values();
        if values.len() != E::COLUMNS.len() {
            return Err(RepoError::InvalidData(format!(
                "{} produced {} column values for {} declared columns",
                E::TABLE,
                values.len(),
                E::COLUMNS.len()
            )));
        }

        let (id, mode) = match entity.id() {
            Some(id) => {
                self.merge_row(id, &values)?;
                (id.clone(), "merge")
            }
            None => match E::generate_id() {
                Some(id) => {
                    self.insert_row_with_id(&id, &values)?;
                    (id, "insert")
                }
                None => (self.insert_row_returning_id(&values)?, "insert"),
            },
        };

        for relation in E::RELATIONS {
            if let Some(keys) = entity.related_keys(relation.name) {
                self.replace_links(relation, &id, &keys)?;
            }
        }

        let mut saved = self
            .find_by_id(&id)?
            .ok_or(RepoError::InconsistentState(
                "saved entity not found in read-back",
            ))?;
        for relation in E::RELATIONS {
            if entity.related_keys(relation.name).is_some() {
                self.load_relation(&mut saved, relation.name)?;
            }
        }

        Ok((saved, mode))
    }

    fn merge_row(&self, id: &E::Id, values: &[Value]) -> RepoResult<()> {
        let mut columns = vec![quote_identifier(E::ID_COLUMN)];
        columns.extend(E::COLUMNS.iter().map(|column| quote_identifier(column)));
        let placeholders = vec!["?"; columns.len()].join(", ");
        let conflict_action = if E::COLUMNS.is_empty() {
            "NOTHING".to_string()
        } else {
            let assignments = E::COLUMNS
                .iter()
                .map(|column| {
                    let quoted = quote_identifier(column);
                    format!("{quoted} = excluded.{quoted}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("UPDATE SET {assignments}")
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT({}) DO {conflict_action};",
            quote_identifier(E::TABLE),
            columns.join(", "),
            quote_identifier(E::ID_COLUMN),
        );

        let mut bind: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
        bind.push(id);
        bind.extend(values.iter().map(|value| value as &dyn ToSql));
        self.conn.execute(&sql, bind.as_slice())?;
        Ok(())
    }

    fn insert_row_with_id(&self, id: &E::Id, values: &[Value]) -> RepoResult<()> {
        let mut columns = vec![quote_identifier(E::ID_COLUMN)];
        columns.extend(E::COLUMNS.iter().map(|column| quote_identifier(column)));
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders});",
            quote_identifier(E::TABLE),
            columns.join(", "),
        );

        let mut bind: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
        bind.push(id);
        bind.extend(values.iter().map(|value| value as &dyn ToSql));
        self.conn.execute(&sql, bind.as_slice())?;
        Ok(())
    }

    fn insert_row_returning_id(&self, values: &[Value]) -> RepoResult<E::Id> {
        let table = quote_identifier(E::TABLE);
        let id_column = quote_identifier(E::ID_COLUMN);
        let sql = if E::COLUMNS.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES RETURNING {id_column};")
        } else {
            let columns = E::COLUMNS
                .iter()
                .map(|column| quote_identifier(column))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
            format!(
                "INSERT INTO {table} ({columns}) VALUES ({placeholders}) RETURNING {id_column};"
            )
        };

        let id = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                row.get::<_, E::Id>(0)
            })?;
        Ok(id)
    }

    fn replace_links(&self, relation: &Relation, id: &E::Id, keys: &[Value]) -> RepoResult<()> {
        let join_table = quote_identifier(relation.join_table);
        let owner_column = quote_identifier(relation.owner_column);
        let item_column = quote_identifier(relation.item_column);

        self.conn.execute(
            &format!("DELETE FROM {join_table} WHERE {owner_column} = ?1;"),
            params![id],
        )?;

        let mut insert = self.conn.prepare(&format!(
            "INSERT OR IGNORE INTO {join_table} ({owner_column}, {item_column}) VALUES (?1, ?2);"
        ))?;
        for key in keys {
            insert.execute(params![id, key])?;
        }

        debug!(
            "event=relation_write module=repo status=ok table={} relation={} owner={} items={}",
            E::TABLE,
            relation.name,
            id,
            keys.len()
        );
        Ok(())
    }

    fn delete_inner(&self, id: &E::Id) -> RepoResult<()> {
        for relation in E::RELATIONS {
            self.conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1;",
                    quote_identifier(relation.join_table),
                    quote_identifier(relation.owner_column)
                ),
                params![id],
            )?;
        }

        let changed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                quote_identifier(E::TABLE),
                quote_identifier(E::ID_COLUMN)
            ),
            params![id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: E::TABLE,
                id: id.to_string(),
            });
        }

        Ok(())
    }

    /// Loads one relation for every entity with one link query per id batch.
    fn load_relation_batch(&self, entities: &mut [E], relation: &Relation) -> RepoResult<()> {
        let join_table = quote_identifier(relation.join_table);
        let owner_column = quote_identifier(relation.owner_column);
        let item_column = quote_identifier(relation.item_column);

        let owners = entities.iter().filter_map(Entity::id).collect::<Vec<_>>();
        let mut keys_by_owner: HashMap<String, Vec<Value>> = HashMap::new();
        for batch in owners.chunks(LINK_BATCH_SIZE) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let mut stmt = self.conn.prepare(&format!(
                "SELECT {owner_column}, {item_column} FROM {join_table} \
                 WHERE {owner_column} IN ({placeholders}) \
                 ORDER BY {owner_column} ASC, {item_column} ASC;"
            ))?;
            let mut rows = stmt.query(params_from_iter(batch.iter()))?;
            while let Some(row) = rows.next()? {
                let owner = row.get::<_, E::Id>(0)?;
                keys_by_owner
                    .entry(owner.to_string())
                    .or_default()
                    .push(row.get::<_, Value>(1)?);
            }
        }

        for entity in entities.iter_mut() {
            let keys = entity
                .id()
                .and_then(|id| keys_by_owner.remove(&id.to_string()))
                .unwrap_or_default();
            entity.set_related_keys(relation.name, keys)?;
        }

        Ok(())
    }
}

impl<E: Entity> Repository<E> for SqliteRepository<'_, E> {
    fn find_by_id(&self, id: &E::Id) -> RepoResult<Option<E>> {
        let sql = format!(
            "{} WHERE {} = ?1;",
            Self::select_sql(),
            quote_identifier(E::ID_COLUMN)
        );
        let entity = self
            .conn
            .query_row(&sql, params![id], |row| E::from_row(row))
            .optional()?;
        Ok(entity)
    }

    fn find_all_matching(&self, spec: &Specification) -> RepoResult<Vec<E>> {
        let (predicate, binds) = spec.to_sql();
        let sql = format!(
            "{} WHERE {predicate} ORDER BY {} ASC;",
            Self::select_sql(),
            quote_identifier(E::ID_COLUMN)
        );
        self.query_entities(&sql, binds)
    }

    fn find_page_matching(
        &self,
        spec: &Specification,
        request: PageRequest,
    ) -> RepoResult<Page<E>> {
        let total_elements = self.count_matching(spec)?;

        let (predicate, mut binds) = spec.to_sql();
        let sql = format!(
            "{} WHERE {predicate} ORDER BY {} ASC LIMIT ? OFFSET ?;",
            Self::select_sql(),
            quote_identifier(E::ID_COLUMN)
        );
        binds.push(Value::Integer(i64::from(request.size())));
        binds.push(Value::Integer(
            i64::try_from(request.offset()).unwrap_or(i64::MAX),
        ));

        let content = self.query_entities(&sql, binds)?;
        Ok(Page::new(content, request, total_elements))
    }

    fn find_all_with(&self, spec: &Specification, relations: &[String]) -> RepoResult<Vec<E>> {
        let declared = relations
            .iter()
            .map(|relation| find_relation::<E>(relation))
            .collect::<Result<Vec<_>, _>>()?;

        let mut entities = self.find_all_matching(spec)?;
        for relation in declared {
            self.load_relation_batch(&mut entities, relation)?;
            debug!(
                "event=fetch_plan module=repo status=ok table={} relation={} owners={}",
                E::TABLE,
                relation.name,
                entities.len()
            );
        }

        Ok(entities)
    }

    fn load_relation(&self, entity: &mut E, relation: &str) -> RepoResult<()> {
        let declared = find_relation::<E>(relation)?;
        let Some(id) = entity.id().cloned() else {
            entity.set_related_keys(relation, Vec::new())?;
            return Ok(());
        };

        let item_column = quote_identifier(declared.item_column);
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {item_column} FROM {} WHERE {} = ?1 ORDER BY {item_column} ASC;",
            quote_identifier(declared.join_table),
            quote_identifier(declared.owner_column)
        ))?;
        let mut rows = stmt.query(params![id])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get::<_, Value>(0)?);
        }

        entity.set_related_keys(relation, keys)?;
        Ok(())
    }

    fn exists_by_id(&self, id: &E::Id) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
                quote_identifier(E::TABLE),
                quote_identifier(E::ID_COLUMN)
            ),
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn count_matching(&self, spec: &Specification) -> RepoResult<u64> {
        let (predicate, binds) = spec.to_sql();
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {predicate};",
                quote_identifier(E::TABLE)
            ),
            params_from_iter(binds),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn save(&self, entity: &E) -> RepoResult<E> {
        let started_at = Instant::now();
        match self.in_savepoint(|| self.save_inner(entity)) {
            Ok((saved, mode)) => {
                info!(
                    "event=entity_save module=repo status=ok table={} mode={mode} duration_ms={}",
                    E::TABLE,
                    started_at.elapsed().as_millis()
                );
                Ok(saved)
            }
            Err(err) => {
                error!(
                    "event=entity_save module=repo status=error table={} duration_ms={} error={}",
                    E::TABLE,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn delete_by_id(&self, id: &E::Id) -> RepoResult<()> {
        let started_at = Instant::now();
        let result = self.in_savepoint(|| self.delete_inner(id));
        match &result {
            Ok(()) => info!(
                "event=entity_delete module=repo status=ok table={} duration_ms={}",
                E::TABLE,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=entity_delete module=repo status=error table={} duration_ms={} error={}",
                E::TABLE,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

fn ensure_entity_schema<E: Entity>(conn: &Connection) -> RepoResult<()> {
    let columns = table_columns(conn, E::TABLE)?;
    if columns.is_empty() {
        return Err(RepoError::MissingRequiredTable(E::TABLE));
    }
    for &column in std::iter::once(&E::ID_COLUMN).chain(E::COLUMNS.iter()) {
        if !columns.iter().any(|current| current == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: E::TABLE,
                column,
            });
        }
    }

    for relation in E::RELATIONS {
        let link_columns = table_columns(conn, relation.join_table)?;
        if link_columns.is_empty() {
            return Err(RepoError::MissingRequiredTable(relation.join_table));
        }
        for column in [relation.owner_column, relation.item_column] {
            if !link_columns.iter().any(|current| current == column) {
                return Err(RepoError::MissingRequiredColumn {
                    table: relation.join_table,
                    column,
                });
            }
        }
    }

    Ok(())
}

/// Column names of `table`; empty when the table does not exist.
fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
