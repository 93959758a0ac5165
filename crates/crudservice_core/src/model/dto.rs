//! Transfer object marker.

use serde::Serialize;

/// Boundary-facing data shape converted to and from entities by a mapper.
///
/// Fields are matched to entity fields by serialized name. Read-side DTOs
/// additionally implement `serde::de::DeserializeOwned`.
pub trait Dto: Serialize {}
