mod common;

use common::{Gadget, SCHEMA};
use crudservice_core::{open_db, open_db_in_memory_with, open_db_with, DbOptions};
use crudservice_core::{Repository, SqliteRepository};
use rusqlite::Connection;

#[test]
fn file_database_keeps_rows_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crud.db");

    let conn_first = open_db(&path).unwrap();
    conn_first.execute_batch(SCHEMA).unwrap();
    let repo = SqliteRepository::<Gadget>::try_new(&conn_first).unwrap();
    let saved = repo.save(&Gadget::new("lamp", None, Some(2))).unwrap();
    drop(repo);
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    let repo = SqliteRepository::<Gadget>::try_new(&conn_second).unwrap();
    let loaded = repo.find_by_id(&saved.id.unwrap()).unwrap().unwrap();
    assert_eq!(loaded, saved);
}

#[test]
fn open_applies_foreign_key_option() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fk.db");

    let conn = open_db(&path).unwrap();
    assert_eq!(foreign_keys(&conn), 1);
    drop(conn);

    let options = DbOptions {
        foreign_keys: false,
        busy_timeout_ms: 100,
    };
    let conn = open_db_with(&path, &options).unwrap();
    assert_eq!(foreign_keys(&conn), 0);
}

#[test]
fn in_memory_open_honours_options_from_crate_root() {
    let options = DbOptions {
        foreign_keys: false,
        ..DbOptions::default()
    };

    let conn = open_db_in_memory_with(&options).unwrap();

    assert_eq!(foreign_keys(&conn), 0);
}

fn foreign_keys(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap()
}
