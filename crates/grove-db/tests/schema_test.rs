//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    grove_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn schema_defines_graph_tables() {
    let db = setup().await;

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    for table in ["group", "user", "membership", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn group_names_are_unique() {
    let db = setup().await;
    let create = "CREATE group SET name = 'Developers', status = 'active'";

    db.query(create).await.unwrap().check().unwrap();
    let result = db.query(create).await.unwrap().check();
    assert!(result.is_err(), "duplicate group name should be rejected");
}

#[tokio::test]
async fn membership_member_type_is_constrained() {
    let db = setup().await;

    let result = db
        .query(
            "CREATE membership SET parent_id = 'a', member_type = 'robot', \
             member_key = 'b'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "unknown member type should be rejected");

    db.query(
        "CREATE membership SET parent_id = 'a', member_type = 'user', \
         member_key = '1001'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();
}

#[tokio::test]
async fn migrations_are_recorded_once() {
    let db = setup().await;
    grove_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT name FROM _migration").await.unwrap();
    let rows: surrealdb_types::Value = result.take(0).unwrap();
    let rows = format!("{rows:?}");
    assert_eq!(rows.matches("membership_graph").count(), 1);
}
