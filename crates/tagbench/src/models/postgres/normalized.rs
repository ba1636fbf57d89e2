//! Normalized PostgreSQL model: `person`, `tag`, `person_tag`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::{person_from_array_row, reserve_ids, PgQuery};
use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, distinct_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS person (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tag (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS person_tag (
        person_id BIGINT NOT NULL REFERENCES person(id),
        tag_id BIGINT NOT NULL REFERENCES tag(id),
        PRIMARY KEY (person_id, tag_id)
    );

    CREATE INDEX IF NOT EXISTS idx_person_tag_tag ON person_tag(tag_id);
"#;

const SEARCH_TAG: &str = r#"
    WITH matched AS (
        SELECT DISTINCT p.id, p.name
          FROM person p
          JOIN person_tag pt ON pt.person_id = p.id
          JOIN tag t ON t.id = pt.tag_id
         WHERE t.name = $1
    )
    SELECT m.id, m.name,
           ARRAY(SELECT t2.name
                   FROM person_tag pt2
                   JOIN tag t2 ON t2.id = pt2.tag_id
                  WHERE pt2.person_id = m.id) AS tags
      FROM matched m
"#;

const SEARCH_TAGS_OR: &str = r#"
    WITH matched AS (
        SELECT DISTINCT p.id, p.name
          FROM person p
          JOIN person_tag pt ON pt.person_id = p.id
          JOIN tag t ON t.id = pt.tag_id
         WHERE t.name = ANY($1)
    )
    SELECT m.id, m.name,
           ARRAY(SELECT t2.name
                   FROM person_tag pt2
                   JOIN tag t2 ON t2.id = pt2.tag_id
                  WHERE pt2.person_id = m.id) AS tags
      FROM matched m
"#;

// Counting matches per person avoids intersecting one join per requested tag.
const SEARCH_TAGS_AND: &str = r#"
    WITH matched AS (
        SELECT p.id, p.name
          FROM person p
          JOIN person_tag pt ON pt.person_id = p.id
          JOIN tag t ON t.id = pt.tag_id
         WHERE t.name = ANY($1)
         GROUP BY p.id, p.name
        HAVING COUNT(DISTINCT t.id) = $2
    )
    SELECT m.id, m.name,
           ARRAY(SELECT t2.name
                   FROM person_tag pt2
                   JOIN tag t2 ON t2.id = pt2.tag_id
                  WHERE pt2.person_id = m.id) AS tags
      FROM matched m
"#;

const ALL_PEOPLE: &str = r#"
    SELECT p.id, p.name,
           ARRAY(SELECT t2.name
                   FROM person_tag pt2
                   JOIN tag t2 ON t2.id = pt2.tag_id
                  WHERE pt2.person_id = p.id) AS tags
      FROM person p
"#;

/// Normalized layout on PostgreSQL.
pub struct PgNormalizedModel {
    pool: PgPool,
}

impl PgNormalizedModel {
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

/// Look up or create every tag in `tags`, returning name -> id.
///
/// Existing tag rows are read, never rewritten or locked.
async fn upsert_tags(conn: &mut PgConnection, tags: &[String]) -> Result<HashMap<String, i64>> {
    if tags.is_empty() {
        return Ok(HashMap::new());
    }

    sqlx::query(
        r#"
        INSERT INTO tag (name)
        SELECT * FROM UNNEST($1::text[])
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(tags.to_vec())
    .execute(&mut *conn)
    .await?;

    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, name FROM tag WHERE name = ANY($1)")
            .bind(tags.to_vec())
            .fetch_all(conn)
            .await?;

    Ok(rows.into_iter().map(|(id, name)| (name, id)).collect())
}

async fn link_tags(conn: &mut PgConnection, person_ids: Vec<i64>, tag_ids: Vec<i64>) -> Result<()> {
    if person_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO person_tag (person_id, tag_id) SELECT * FROM UNNEST($1::int8[], $2::int8[])",
    )
    .bind(person_ids)
    .bind(tag_ids)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl TagModel for PgNormalizedModel {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Normalized
    }

    async fn setup(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let tags = dedup_tags(tags);
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar("INSERT INTO person (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        let tag_ids = upsert_tags(&mut tx, &tags).await?;
        link_tags(
            &mut tx,
            vec![id; tags.len()],
            tags.iter().map(|tag| tag_ids[tag]).collect(),
        )
        .await?;
        tx.commit().await?;

        Ok(Person {
            id,
            name: name.to_string(),
            tags,
        })
    }

    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>> {
        let all_tags = distinct_tags(people);
        let mut tx = self.pool.begin().await?;

        let tag_ids = upsert_tags(&mut tx, &all_tags).await?;
        let ids = reserve_ids(&mut tx, "person", people.len()).await?;

        let names: Vec<String> = people.iter().map(|person| person.name.clone()).collect();
        sqlx::query("INSERT INTO person (id, name) SELECT * FROM UNNEST($1::int8[], $2::text[])")
            .bind(ids.clone())
            .bind(names)
            .execute(&mut *tx)
            .await?;

        let mut created = Vec::with_capacity(people.len());
        let mut link_people = Vec::new();
        let mut link_tag_ids = Vec::new();
        for (&id, person) in ids.iter().zip(people) {
            let tags = dedup_tags(&person.tags);
            for tag in &tags {
                link_people.push(id);
                link_tag_ids.push(tag_ids[tag]);
            }
            created.push(Person {
                id,
                name: person.name.clone(),
                tags,
            });
        }
        link_tags(&mut tx, link_people, link_tag_ids).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let tags = dedup_tags(tags);
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM person WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(Error::PersonNotFound(id));
        }

        sqlx::query("DELETE FROM person_tag WHERE person_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let tag_ids = upsert_tags(&mut tx, &tags).await?;
        link_tags(
            &mut tx,
            vec![id; tags.len()],
            tags.iter().map(|tag| tag_ids[tag]).collect(),
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Person>> {
        self.fetch_people(sqlx::query(SEARCH_TAG).bind(tag.to_string()))
            .await
    }

    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>> {
        let wanted = dedup_tags(tags);
        if wanted.is_empty() {
            // Every tag set is a superset of the empty set.
            return self.fetch_people(sqlx::query(ALL_PEOPLE)).await;
        }

        let count = wanted.len() as i64;
        self.fetch_people(sqlx::query(SEARCH_TAGS_AND).bind(wanted).bind(count))
            .await
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.fetch_people(sqlx::query(SEARCH_TAGS_OR).bind(tags.to_vec()))
            .await
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM person ORDER BY id LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn count_persons(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM person")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn cleanup(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["person_tag", "person", "tag"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
