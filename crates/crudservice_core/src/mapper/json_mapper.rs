//! Convention-based mapper backed by `serde_json` field maps.

use super::overlay::{copy_properties, to_field_map};
use super::MapResult;
use crate::model::dto::Dto;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Bidirectional entity/DTO conversion.
pub trait Mapper<T> {
    /// Builds a transfer object from an entity.
    fn to_dto<D: Dto + DeserializeOwned>(&self, entity: &T) -> MapResult<D>;

    /// Builds a new entity from a transfer object.
    fn to_entity<D: Dto>(&self, dto: &D) -> MapResult<T>;

    /// Overwrites the matching fields of `entity` with the DTO's values,
    /// nulls included.
    fn map_onto<D: Dto>(&self, dto: &D, entity: &mut T) -> MapResult<()>;
}

/// Mapper matching fields by exact serialized name.
///
/// Target fields missing from the source take their serde default
/// (`Option` fields become `None`); other missing fields fail the mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMapper;

impl JsonMapper {
    pub fn new() -> Self {
        Self
    }

    fn convert<S, D>(source: &S) -> MapResult<D>
    where
        S: Serialize + ?Sized,
        D: DeserializeOwned,
    {
        let fields = to_field_map(source)?;
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

impl<T> Mapper<T> for JsonMapper
where
    T: Serialize + DeserializeOwned,
{
    fn to_dto<D: Dto + DeserializeOwned>(&self, entity: &T) -> MapResult<D> {
        Self::convert(entity)
    }

    fn to_entity<D: Dto>(&self, dto: &D) -> MapResult<T> {
        Self::convert(dto)
    }

    fn map_onto<D: Dto>(&self, dto: &D, entity: &mut T) -> MapResult<()> {
        copy_properties(dto, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonMapper, Mapper};
    use crate::mapper::MapError;
    use crate::model::dto::Dto;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        id: Option<i64>,
        title: String,
        #[serde(rename = "pageCount")]
        pages: Option<i64>,
        isbn: Option<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct BookSummary {
        title: String,
        #[serde(rename = "pageCount")]
        page_count: Option<i64>,
    }

    impl Dto for BookSummary {}

    #[derive(Serialize)]
    struct NewBook {
        title: String,
    }

    impl Dto for NewBook {}

    #[derive(Serialize)]
    struct Untitled {
        isbn: String,
    }

    impl Dto for Untitled {}

    #[test]
    fn to_dto_matches_by_serialized_name() {
        let book = Book {
            id: Some(1),
            title: "Dune".to_string(),
            pages: Some(412),
            isbn: None,
        };

        let summary: BookSummary = JsonMapper.to_dto(&book).unwrap();

        assert_eq!(
            summary,
            BookSummary {
                title: "Dune".to_string(),
                page_count: Some(412),
            }
        );
    }

    #[test]
    fn to_entity_defaults_missing_optional_fields() {
        let book: Book = JsonMapper
            .to_entity(&NewBook {
                title: "Emma".to_string(),
            })
            .unwrap();

        assert_eq!(book.id, None);
        assert_eq!(book.title, "Emma");
        assert_eq!(book.pages, None);
    }

    #[test]
    fn to_entity_fails_when_required_field_is_missing() {
        let result: Result<Book, _> = JsonMapper.to_entity(&Untitled {
            isbn: "x".to_string(),
        });
        assert!(matches!(result, Err(MapError::Json(_))));
    }

    #[test]
    fn map_onto_overwrites_matching_fields_in_place() {
        let mut book = Book {
            id: Some(3),
            title: "Old".to_string(),
            pages: Some(10),
            isbn: Some("123".to_string()),
        };
        let summary = BookSummary {
            title: "New".to_string(),
            page_count: None,
        };

        JsonMapper.map_onto(&summary, &mut book).unwrap();

        assert_eq!(book.id, Some(3));
        assert_eq!(book.title, "New");
        assert_eq!(book.pages, None);
        assert_eq!(book.isbn.as_deref(), Some("123"));
    }
}
