//! Array PostgreSQL model: tags in a `TEXT[]` column behind a GIN index.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{person_from_array_row, reserve_ids, PgQuery, INSERT_CHUNK_ROWS};
use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS person_array (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        tags TEXT[] NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_person_array_tags ON person_array USING GIN (tags);
"#;

/// Array layout on PostgreSQL.
pub struct PgArrayModel {
    pool: PgPool,
}

impl PgArrayModel {
    /// Create a model over a shared pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_people(&self, query: PgQuery<'_>) -> Result<Vec<Person>> {
        query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(person_from_array_row)
            .collect()
    }
}

#[async_trait]
impl TagModel for PgArrayModel {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Array
    }

    async fn setup(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let row = sqlx::query(
            "INSERT INTO person_array (name, tags) VALUES ($1, $2) RETURNING id, name, tags",
        )
        .bind(name)
        .bind(dedup_tags(tags))
        .fetch_one(&self.pool)
        .await?;
        person_from_array_row(&row)
    }

    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>> {
        let mut tx = self.pool.begin().await?;
        let ids = reserve_ids(&mut tx, "person_array", people.len()).await?;

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
                QueryBuilder::<Postgres>::new("INSERT INTO person_array (id, name, tags) ");
            builder.push_values(chunk, |mut row, person| {
                row.push_bind(person.id)
                    .push_bind(person.name.clone())
                    .push_bind(person.tags.clone());
            });
            builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(created)
    }

    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let updated = sqlx::query("UPDATE person_array SET tags = $1 WHERE id = $2")
            .bind(dedup_tags(tags))
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
            sqlx::query("SELECT id, name, tags FROM person_array WHERE tags @> ARRAY[$1::text]")
                .bind(tag.to_string()),
        )
        .await
    }

    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.fetch_people(
            sqlx::query("SELECT id, name, tags FROM person_array WHERE tags @> $1::text[]")
                .bind(tags.to_vec()),
        )
        .await
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.fetch_people(
            sqlx::query("SELECT id, name, tags FROM person_array WHERE tags && $1::text[]")
                .bind(tags.to_vec()),
        )
        .await
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM person_array ORDER BY id LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn count_persons(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person_array")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn cleanup(&self) -> Result<()> {
        sqlx::query("DELETE FROM person_array")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
