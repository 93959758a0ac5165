//! Entity contract shared by repositories and services.
//!
//! # Responsibility
//! - Describe how one Rust type maps onto one SQLite table.
//! - Declare collection-valued fields as link-table relations.
//!
//! # Invariants
//! - `column_values()` returns exactly one value per entry of `COLUMNS`,
//!   in the same order.
//! - `COLUMNS` never contains `ID_COLUMN`.
//! - A relation whose items are `None` is "not loaded" and is never written.

use rusqlite::types::{FromSql, ToSql, Value};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub type RelationResult<T> = Result<T, RelationError>;

/// Errors raised while resolving or mutating a declared relation.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationError {
    /// The entity declares no relation (or accessor) with this name.
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },
    /// A stored link key cannot be converted to the relation item type.
    InvalidItem { relation: String, message: String },
}

impl Display for RelationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownRelation { entity, relation } => {
                write!(f, "entity `{entity}` has no relation `{relation}`")
            }
            Self::InvalidItem { relation, message } => {
                write!(f, "invalid item in relation `{relation}`: {message}")
            }
        }
    }
}

impl Error for RelationError {}

/// Collection-valued field persisted as rows of a link table.
///
/// Each link row pairs the owner identifier (`owner_column`) with one item
/// key (`item_column`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Name used by callers (`attach`, fetch plans).
    pub name: &'static str,
    pub join_table: &'static str,
    pub owner_column: &'static str,
    pub item_column: &'static str,
}

/// Table mapping for one persisted record type.
///
/// # Example
///
/// ```ignore
/// impl Entity for Gadget {
///     type Id = i64;
///     const TABLE: &'static str = "gadgets";
///     const COLUMNS: &'static [&'static str] = &["name", "color"];
///
///     fn id(&self) -> Option<&i64> { self.id.as_ref() }
///     fn set_id(&mut self, id: i64) { self.id = Some(id); }
///     fn column_values(&self) -> Vec<Value> {
///         vec![self.name.clone().into(), self.color.clone().into()]
///     }
///     fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
///         Ok(Self { id: row.get("id")?, name: row.get("name")?, color: row.get("color")? })
///     }
/// }
/// ```
pub trait Entity: Sized {
    type Id: ToSql + FromSql + Clone + Debug + Display;

    const TABLE: &'static str;
    const ID_COLUMN: &'static str = "id";
    /// Persisted columns other than the identifier.
    const COLUMNS: &'static [&'static str];
    const RELATIONS: &'static [Relation] = &[];

    /// Returns the identifier, or `None` for a not-yet-persisted entity.
    fn id(&self) -> Option<&Self::Id>;

    fn set_id(&mut self, id: Self::Id);

    /// Client-side identifier for new entities.
    ///
    /// `None` lets the store generate the key.
    fn generate_id() -> Option<Self::Id> {
        None
    }

    /// Values for `COLUMNS`, same order.
    fn column_values(&self) -> Vec<Value>;

    /// Builds an entity from a row selecting `ID_COLUMN` and `COLUMNS`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Loaded item keys of one relation. `None` means not loaded.
    fn related_keys(&self, _relation: &str) -> Option<Vec<Value>> {
        None
    }

    /// Replaces the loaded items of one relation.
    fn set_related_keys(&mut self, relation: &str, _keys: Vec<Value>) -> RelationResult<()> {
        Err(unknown_relation::<Self>(relation))
    }
}

/// Capability to add one item to a named collection-valued field.
///
/// An unset collection starts empty before the item is added.
pub trait AddRelated<I>: Entity {
    fn add_related(&mut self, relation: &str, item: I) -> RelationResult<()>;
}

/// Looks up a declared relation by name.
pub fn find_relation<E: Entity>(name: &str) -> RelationResult<&'static Relation> {
    E::RELATIONS
        .iter()
        .find(|relation| relation.name == name)
        .ok_or_else(|| unknown_relation::<E>(name))
}

/// Builds the `UnknownRelation` error for entity `E`.
pub fn unknown_relation<E: Entity>(relation: &str) -> RelationError {
    RelationError::UnknownRelation {
        entity: E::TABLE,
        relation: relation.to_string(),
    }
}
