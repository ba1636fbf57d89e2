//! Document PostgreSQL model: tags as a `JSONB` array behind a GIN index.
//!
//! Containment (`@>`) answers single-tag and AND searches; the key-exists-any
//! operator (`?|`) answers OR searches. Both are served by the default
//! `jsonb_ops` GIN operator class.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{person_from_document_row, reserve_ids, PgQuery, INSERT_CHUNK_ROWS};
use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS person_document (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        tags JSONB NOT NULL DEFAULT '[]'::jsonb
    );

    CREATE INDEX IF NOT EXISTS idx_person_document_tags ON person_document USING GIN (tags);
"#;

/// Document layout on PostgreSQL.
pub struct PgDocumentModel {
    pool: PgPool,
}

impl PgDocumentModel {
    /// Create a model over a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_people(&self, query: PgQuery<'_>) -> Result<Vec<Person>> {
        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(person_from_document_row)
            .collect()
    }
}

#[async_trait]
impl TagModel for PgDocumentModel {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Document
    }

    async fn setup(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let row = sqlx::query(
            "INSERT INTO person_document (name, tags) VALUES ($1, $2) RETURNING id, name, tags",
        )
        .bind(name)
        .bind(Json(dedup_tags(tags)))
        .fetch_one(&self.pool)
        .await?;
        person_from_document_row(&row)
    }

    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>> {
        let mut tx = self.pool.begin().await?;
        let ids = reserve_ids(&mut tx, "person_document", people.len()).await?;

        let created: Vec<Person> = ids
            .into_iter()
            .zip(people)
            .map(|(id, person)| Person {
                id,
                name: person.name.clone(),
                tags: dedup_tags(&person.tags),
            })
            .collect();

        for chunk in created.chunks(INSERT_CHUNK_ROWS) {
            let mut builder =
                QueryBuilder::<Postgres>::new("INSERT INTO person_document (id, name, tags) ");
            builder.push_values(chunk, |mut row, person| {
                row.push_bind(person.id)
                    .push_bind(person.name.clone())
                    .push_bind(Json(person.tags.clone()));
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(created)
    }

    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let updated = sqlx::query("UPDATE person_document SET tags = $1 WHERE id = $2")
            .bind(Json(dedup_tags(tags)))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::PersonNotFound(id));
        }
        Ok(())
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Person>> {
        self.fetch_people(
            sqlx::query(
                "SELECT id, name, tags FROM person_document WHERE tags @> jsonb_build_array($1::text)",
            )
            .bind(tag.to_string()),
        )
        .await
    }

    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.fetch_people(
            sqlx::query("SELECT id, name, tags FROM person_document WHERE tags @> $1")
                .bind(Json(tags.to_vec())),
        )
        .await
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.fetch_people(
            sqlx::query("SELECT id, name, tags FROM person_document WHERE tags ?| $1::text[]")
                .bind(tags.to_vec()),
        )
        .await
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM person_document ORDER BY id LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn count_persons(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person_document")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn cleanup(&self) -> Result<()> {
        sqlx::query("DELETE FROM person_document")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
