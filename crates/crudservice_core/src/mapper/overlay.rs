//! Field-by-field property overlays.
//!
//! Both functions serialize source and target to field maps, overlay
//! source entries onto the target map and deserialize the result back into
//! the target type. Source fields unknown to the target are dropped by
//! serde unless the target denies unknown fields.

use super::{MapError, MapResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Copies every field of `source` onto `target`, nulls included.
pub fn copy_properties<S, T>(source: &S, target: &mut T) -> MapResult<()>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
{
    overlay(source, target, false)
}

/// Copies only the non-null fields of `source` onto `target`.
///
/// A `None` in the source never clears a value in the target.
pub fn copy_non_null_properties<S, T>(source: &S, target: &mut T) -> MapResult<()>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
{
    overlay(source, target, true)
}

pub(crate) fn to_field_map<V: Serialize + ?Sized>(value: &V) -> MapResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        Value::Null => Err(MapError::NotAnObject("null")),
        Value::Bool(_) => Err(MapError::NotAnObject("bool")),
        Value::Number(_) => Err(MapError::NotAnObject("number")),
        Value::String(_) => Err(MapError::NotAnObject("string")),
        Value::Array(_) => Err(MapError::NotAnObject("array")),
    }
}

fn overlay<S, T>(source: &S, target: &mut T, skip_null: bool) -> MapResult<()>
where
    S: Serialize + ?Sized,
    T: Serialize + DeserializeOwned,
{
    let source_fields = to_field_map(source)?;
    let mut target_fields = to_field_map(target)?;

    for (name, value) in source_fields {
        if skip_null && value.is_null() {
            continue;
        }
        target_fields.insert(name, value);
    }

    *target = serde_json::from_value(Value::Object(target_fields))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{copy_non_null_properties, copy_properties};
    use crate::mapper::MapError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Target {
        id: i64,
        name: String,
        color: Option<String>,
        weight: Option<i64>,
    }

    #[derive(Serialize)]
    struct Patch {
        name: Option<String>,
        color: Option<String>,
        unrelated: Option<bool>,
    }

    fn target() -> Target {
        Target {
            id: 7,
            name: "old".to_string(),
            color: Some("red".to_string()),
            weight: Some(3),
        }
    }

    #[test]
    fn non_null_overlay_keeps_fields_for_null_sources() {
        let mut value = target();
        let patch = Patch {
            name: Some("new".to_string()),
            color: None,
            unrelated: None,
        };

        copy_non_null_properties(&patch, &mut value).unwrap();

        assert_eq!(value.name, "new");
        assert_eq!(value.color.as_deref(), Some("red"));
        assert_eq!(value.weight, Some(3));
        assert_eq!(value.id, 7);
    }

    #[test]
    fn full_overlay_clears_fields_for_null_sources() {
        let mut value = target();
        let patch = Patch {
            name: Some("new".to_string()),
            color: None,
            unrelated: Some(true),
        };

        copy_properties(&patch, &mut value).unwrap();

        assert_eq!(value.name, "new");
        assert_eq!(value.color, None);
        assert_eq!(value.weight, Some(3));
    }

    #[test]
    fn type_mismatch_leaves_target_untouched() {
        let mut value = target();
        let patch = serde_json::json!({ "weight": "heavy" });

        let err = copy_non_null_properties(&patch, &mut value).unwrap_err();

        assert!(matches!(err, MapError::Json(_)));
        assert_eq!(value, target());
    }

    #[test]
    fn non_object_source_is_rejected() {
        let mut value = target();
        let err = copy_properties(&42_i64, &mut value).unwrap_err();
        assert!(matches!(err, MapError::NotAnObject("number")));
    }
}
