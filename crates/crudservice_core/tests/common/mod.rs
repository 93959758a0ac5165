#![allow(dead_code)]

use crudservice_core::db::open_db_in_memory;
use crudservice_core::model::entity::unknown_relation;
use crudservice_core::{AddRelated, Dto, Entity, Relation, RelationError, RelationResult};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const SCHEMA: &str = "
CREATE TABLE gadgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    color TEXT,
    weight INTEGER
);
CREATE TABLE widgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL
);
CREATE TABLE gadget_widgets (
    gadget_id INTEGER NOT NULL REFERENCES gadgets(id),
    widget_id INTEGER NOT NULL REFERENCES widgets(id),
    PRIMARY KEY (gadget_id, widget_id)
);
CREATE TABLE labels (
    id BLOB PRIMARY KEY NOT NULL,
    title TEXT NOT NULL
);
";

pub fn setup() -> Connection {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gadget {
    pub id: Option<i64>,
    pub name: String,
    pub color: Option<String>,
    pub weight: Option<i64>,
    pub widgets: Option<BTreeSet<i64>>,
}

impl Gadget {
    pub fn new(name: &str, color: Option<&str>, weight: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            color: color.map(str::to_string),
            weight,
            widgets: None,
        }
    }
}

impl Entity for Gadget {
    type Id = i64;

    const TABLE: &'static str = "gadgets";
    const COLUMNS: &'static [&'static str] = &["name", "color", "weight"];
    const RELATIONS: &'static [Relation] = &[Relation {
        name: "widgets",
        join_table: "gadget_widgets",
        owner_column: "gadget_id",
        item_column: "widget_id",
    }];

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.color.clone().into(),
            self.weight.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            color: row.get("color")?,
            weight: row.get("weight")?,
            widgets: None,
        })
    }

    fn related_keys(&self, relation: &str) -> Option<Vec<Value>> {
        match relation {
            "widgets" => self
                .widgets
                .as_ref()
                .map(|items| items.iter().copied().map(Value::from).collect()),
            _ => None,
        }
    }

    fn set_related_keys(&mut self, relation: &str, keys: Vec<Value>) -> RelationResult<()> {
        match relation {
            "widgets" => {
                let mut items = BTreeSet::new();
                for key in keys {
                    match key {
                        Value::Integer(id) => {
                            items.insert(id);
                        }
                        other => {
                            return Err(RelationError::InvalidItem {
                                relation: relation.to_string(),
                                message: format!("expected integer key, got {other:?}"),
                            })
                        }
                    }
                }
                self.widgets = Some(items);
                Ok(())
            }
            other => Err(unknown_relation::<Self>(other)),
        }
    }
}

impl AddRelated<i64> for Gadget {
    fn add_related(&mut self, relation: &str, item: i64) -> RelationResult<()> {
        match relation {
            "widgets" => {
                self.widgets.get_or_insert_with(BTreeSet::new).insert(item);
                Ok(())
            }
            other => Err(unknown_relation::<Self>(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Option<i64>,
    pub label: String,
}

impl Entity for Widget {
    type Id = i64;

    const TABLE: &'static str = "widgets";
    const COLUMNS: &'static [&'static str] = &["label"];

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.label.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            label: row.get("label")?,
        })
    }
}

/// Entity with client-generated UUID keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: Option<Uuid>,
    pub title: String,
}

impl Entity for Label {
    type Id = Uuid;

    const TABLE: &'static str = "labels";
    const COLUMNS: &'static [&'static str] = &["title"];

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn generate_id() -> Option<Uuid> {
        Some(Uuid::new_v4())
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.title.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get("id")?),
            title: row.get("title")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGadget {
    pub name: String,
    pub color: Option<String>,
    pub weight: Option<i64>,
}

impl Dto for NewGadget {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GadgetPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub weight: Option<i64>,
}

impl Dto for GadgetPatch {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GadgetView {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
}

impl Dto for GadgetView {}

#[derive(Debug, Clone, Serialize)]
pub struct NewWidget {
    pub label: String,
}

impl Dto for NewWidget {}
