//! Entity/DTO conversion.
//!
//! # Responsibility
//! - Convert between entities and transfer objects by field-name convention.
//! - Provide property overlays for in-place and partial updates.
//!
//! # Invariants
//! - Fields match by exact serialized name; no fuzzy or tokenized matching.
//! - Failed conversions leave the target untouched.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod json_mapper;
pub mod overlay;

pub type MapResult<T> = Result<T, MapError>;

/// Conversion failure between entity and DTO shapes.
#[derive(Debug)]
pub enum MapError {
    /// Serialization or typed deserialization failed.
    Json(serde_json::Error),
    /// Value did not serialize to a field map.
    NotAnObject(&'static str),
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "mapping failed: {err}"),
            Self::NotAnObject(kind) => {
                write!(f, "mapping requires a struct-like value, got {kind}")
            }
        }
    }
}

impl Error for MapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::NotAnObject(_) => None,
        }
    }
}

impl From<serde_json::Error> for MapError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
