//! Integration tests for the PostgreSQL models.
//!
//! These need a live server: set `DATABASE_URL` to run them. The models
//! share one database, so everything runs inside a single test.

#![cfg(feature = "postgres")]

mod common;

use common::tags;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tagbench::models::postgres::{PgArrayModel, PgDocumentModel, PgNormalizedModel};
use tagbench::{
    ConnectionConfig, EngineKind, Engines, Error, PersonData, PersonGenerator, TagModel,
};

/// Transaction id that last wrote the tag row.
async fn tag_xmin(pool: &PgPool, name: &str) -> String {
    sqlx::query_scalar("SELECT xmin::text FROM tag WHERE name = $1")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_postgres_models() {
    let config = ConnectionConfig::from_env();
    let Some(url) = config.database_url.clone() else {
        eprintln!("DATABASE_URL not set, skipping PostgreSQL model tests");
        return;
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&url)
        .await
        .unwrap();
    let mut engines = Engines::new(config).with_postgres(pool.clone());
    assert!(engines.is_connected(EngineKind::Postgres));
    // An injected pool is kept as is.
    engines.connect(EngineKind::Postgres).await.unwrap();

    let normalized = PgNormalizedModel::new(pool.clone());
    let array = PgArrayModel::new(pool.clone());
    let document = PgDocumentModel::new(pool);
    let models: [&dyn TagModel; 3] = [&normalized, &array, &document];

    for model in models {
        common::check_all(model).await;
    }

    let people = PersonGenerator::new(11).people(500);
    common::check_equivalent(&models, &people).await;

    // Batch of 1000 sharing one tag stores one tag row.
    common::reset(&normalized).await;
    let shared: Vec<PersonData> = (1..=1000)
        .map(|i| PersonData::new(format!("Person {}", i), ["engineer"]))
        .collect();
    normalized.insert_persons_batch(&shared).await.unwrap();
    let tag_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag WHERE name = 'engineer'")
        .fetch_one(engines.postgres().unwrap())
        .await
        .unwrap();
    assert_eq!(tag_rows, 1);

    // Reusing an existing tag only reads its row.
    let before = tag_xmin(engines.postgres().unwrap(), "engineer").await;
    let person = normalized
        .insert_person("Person 1001", &tags(&["engineer", "remote"]))
        .await
        .unwrap();
    normalized
        .update_person_tags(person.id, &tags(&["engineer", "qa"]))
        .await
        .unwrap();
    assert_eq!(tag_xmin(engines.postgres().unwrap(), "engineer").await, before);

    for model in models {
        model.cleanup().await.unwrap();
    }

    engines.close().await;
    let err = normalized.search_by_tag("engineer").await.unwrap_err();
    assert!(matches!(err, Error::EngineNotInitialized(EngineKind::Postgres)));
}
