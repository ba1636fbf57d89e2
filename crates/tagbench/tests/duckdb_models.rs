//! Integration tests for the DuckDB models.

#![cfg(feature = "duckdb")]

mod common;

use std::collections::HashSet;

use common::tags;
use tagbench::models::duckdb::{DuckDbArrayModel, DuckDbDocumentModel, DuckDbNormalizedModel};
use tagbench::models::sqlite::SqliteNormalizedModel;
use tagbench::{
    DuckDbHandle, EngineKind, Error, PersonData, PersonGenerator, SqliteHandle, TagModel,
};

fn handle() -> DuckDbHandle {
    DuckDbHandle::open_in_memory().unwrap()
}

fn scalar(handle: &DuckDbHandle, sql: &str) -> i64 {
    handle
        .with_conn(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
        .unwrap()
}

fn execute(handle: &DuckDbHandle, sql: &str) {
    handle
        .with_conn(|conn| Ok(conn.execute_batch(sql)?))
        .unwrap();
}

#[tokio::test]
async fn test_normalized_shared_behaviour() {
    let model = DuckDbNormalizedModel::new(handle());
    common::check_all(&model).await;
}

#[tokio::test]
async fn test_array_shared_behaviour() {
    let model = DuckDbArrayModel::new(handle());
    common::check_all(&model).await;
}

#[tokio::test]
async fn test_document_shared_behaviour() {
    let model = DuckDbDocumentModel::new(handle());
    common::check_all(&model).await;
}

#[tokio::test]
async fn test_layouts_agree_on_one_connection() {
    let db = handle();
    let normalized = DuckDbNormalizedModel::new(db.clone());
    let array = DuckDbArrayModel::new(db.clone());
    let document = DuckDbDocumentModel::new(db);
    let people = PersonGenerator::new(7).people(300);

    let models: [&dyn TagModel; 3] = [&normalized, &array, &document];
    common::check_equivalent(&models, &people).await;
}

#[tokio::test]
async fn test_engines_agree_on_generated_data() {
    let array = DuckDbArrayModel::new(handle());
    let sqlite = SqliteNormalizedModel::new(SqliteHandle::open_in_memory().unwrap());
    let people = PersonGenerator::new(11).people(200);

    let models: [&dyn TagModel; 2] = [&array, &sqlite];
    common::check_equivalent(&models, &people).await;
}

#[tokio::test]
async fn test_normalized_batch_shares_tag_rows() {
    let db = handle();
    let model = DuckDbNormalizedModel::new(db.clone());
    common::reset(&model).await;

    let people: Vec<PersonData> = (1..=500)
        .map(|i| PersonData::new(format!("Person {}", i), ["engineer"]))
        .collect();
    model.insert_persons_batch(&people).await.unwrap();

    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM tag WHERE name = 'engineer'"), 1);
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM person_tag"), 500);

    model
        .insert_person("Person 501", &tags(&["engineer", "remote"]))
        .await
        .unwrap();
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM tag"), 2);
    assert_eq!(model.search_by_tag("engineer").await.unwrap().len(), 501);
}

#[tokio::test]
async fn test_normalized_update_keeps_overlapping_links() {
    let db = handle();
    let model = DuckDbNormalizedModel::new(db.clone());
    common::reset(&model).await;
    let person = model
        .insert_person("Ada", &tags(&["engineer", "remote"]))
        .await
        .unwrap();

    model
        .update_person_tags(person.id, &tags(&["remote", "qa", "qa"]))
        .await
        .unwrap();

    assert!(model.search_by_tag("engineer").await.unwrap().is_empty());
    let found = model.search_by_tag("remote").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tag_set(), HashSet::from(["qa", "remote"]));
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM person_tag"), 2);
}

#[tokio::test]
async fn test_normalized_failed_batch_rolls_back() {
    let db = handle();
    execute(
        &db,
        "CREATE SEQUENCE person_id_seq;
         CREATE TABLE person (
             id BIGINT PRIMARY KEY DEFAULT nextval('person_id_seq'),
             name VARCHAR NOT NULL CHECK (name <> 'poison')
         );",
    );
    let model = DuckDbNormalizedModel::new(db.clone());
    common::reset(&model).await;

    let people = vec![
        PersonData::new("Ada", ["engineer"]),
        PersonData::new("Brook", ["remote"]),
        PersonData::new("poison", ["frontend"]),
    ];
    let err = model.insert_persons_batch(&people).await.unwrap_err();
    assert!(matches!(err, Error::DuckDb(_)));

    assert_eq!(model.count_persons().await.unwrap(), 0);
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM tag"), 0);
    assert_eq!(scalar(&db, "SELECT COUNT(*) FROM person_tag"), 0);
}

#[tokio::test]
async fn test_normalized_failed_update_keeps_old_tags() {
    let db = handle();
    execute(
        &db,
        "CREATE SEQUENCE tag_id_seq;
         CREATE TABLE tag (
             id BIGINT PRIMARY KEY DEFAULT nextval('tag_id_seq'),
             name VARCHAR NOT NULL UNIQUE CHECK (name <> 'poison')
         );",
    );
    let model = DuckDbNormalizedModel::new(db.clone());
    common::reset(&model).await;
    let person = model
        .insert_person("Ada", &tags(&["engineer", "senior"]))
        .await
        .unwrap();

    let err = model
        .update_person_tags(person.id, &tags(&["remote", "poison"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuckDb(_)));

    let found = model.search_by_tag("engineer").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tag_set(), person.tag_set());
    assert!(model.search_by_tag("remote").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_array_failed_batch_rolls_back() {
    let db = handle();
    execute(
        &db,
        "CREATE SEQUENCE person_array_id_seq;
         CREATE TABLE person_array (
             id BIGINT NOT NULL DEFAULT nextval('person_array_id_seq'),
             name VARCHAR NOT NULL CHECK (name <> 'poison'),
             tags VARCHAR[] NOT NULL
         );",
    );
    let model = DuckDbArrayModel::new(db);
    common::reset(&model).await;

    let people = vec![
        PersonData::new("Ada", ["engineer"]),
        PersonData::new("poison", ["frontend"]),
    ];
    assert!(model.insert_persons_batch(&people).await.is_err());
    assert_eq!(model.count_persons().await.unwrap(), 0);
}

#[tokio::test]
async fn test_document_rejects_non_array_rows() {
    let db = handle();
    let model = DuckDbDocumentModel::new(db.clone());
    common::reset(&model).await;

    let result = db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO person_document (name, tags) VALUES ('Ada', '{\"engineer\": true}')",
            [],
        )?;
        Ok(())
    });
    assert!(matches!(result, Err(Error::DuckDb(_))));
}

#[tokio::test]
async fn test_closed_handle_is_not_initialized() {
    let db = handle();
    let model = DuckDbArrayModel::new(db.clone());
    common::reset(&model).await;

    db.close();
    let err = model.search_by_tag("engineer").await.unwrap_err();
    assert!(err.is_precondition());
    assert!(matches!(err, Error::EngineNotInitialized(EngineKind::DuckDb)));
}

#[tokio::test]
async fn test_file_backed_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tags.duckdb");

    {
        let db = DuckDbHandle::open(&path).unwrap();
        let model = DuckDbDocumentModel::new(db.clone());
        common::reset(&model).await;
        model
            .insert_persons_batch(&common::crew())
            .await
            .unwrap();
        db.close();
    }

    let db = DuckDbHandle::open(&path).unwrap();
    let model = DuckDbDocumentModel::new(db);
    model.setup().await.unwrap();
    assert_eq!(model.count_persons().await.unwrap(), 5);
    assert_eq!(
        model
            .search_by_tags_and(&tags(&["engineer", "remote"]))
            .await
            .unwrap()[0]
            .name,
        "Ada"
    );
}
