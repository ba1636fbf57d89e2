//! Normalized DuckDB model: `person`, `tag`, `person_tag`.

use std::collections::HashMap;

use async_trait::async_trait;
use duckdb::{params, Transaction};

use super::{count_rows, ids_in_order, list_param, query_people};
use crate::engine::{DuckDbHandle, EngineKind};
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, distinct_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE SEQUENCE IF NOT EXISTS person_id_seq;
    CREATE SEQUENCE IF NOT EXISTS tag_id_seq;

    CREATE TABLE IF NOT EXISTS person (
        id BIGINT PRIMARY KEY DEFAULT nextval('person_id_seq'),
        name VARCHAR NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tag (
        id BIGINT PRIMARY KEY DEFAULT nextval('tag_id_seq'),
        name VARCHAR NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS person_tag (
        person_id BIGINT NOT NULL,
        tag_id BIGINT NOT NULL,
        PRIMARY KEY (person_id, tag_id)
    );
"#;

const SEARCH_TAG: &str = r#"
    SELECT m.id, m.name,
           CAST(to_json(coalesce(
               (SELECT list(t2.name)
                  FROM person_tag pt2
                  JOIN tag t2 ON t2.id = pt2.tag_id
                 WHERE pt2.person_id = m.id),
               []::VARCHAR[])) AS VARCHAR)
      FROM (SELECT DISTINCT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE t.name = ?) m
"#;

const SEARCH_TAGS_OR: &str = r#"
    SELECT m.id, m.name,
           CAST(to_json(coalesce(
               (SELECT list(t2.name)
                  FROM person_tag pt2
                  JOIN tag t2 ON t2.id = pt2.tag_id
                 WHERE pt2.person_id = m.id),
               []::VARCHAR[])) AS VARCHAR)
      FROM (SELECT DISTINCT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE list_contains(CAST(CAST(? AS JSON) AS VARCHAR[]), t.name)) m
"#;

const SEARCH_TAGS_AND: &str = r#"
    SELECT m.id, m.name,
           CAST(to_json(coalesce(
               (SELECT list(t2.name)
                  FROM person_tag pt2
                  JOIN tag t2 ON t2.id = pt2.tag_id
                 WHERE pt2.person_id = m.id),
               []::VARCHAR[])) AS VARCHAR)
      FROM (SELECT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE list_contains(CAST(CAST(? AS JSON) AS VARCHAR[]), t.name)
             GROUP BY p.id, p.name
            HAVING COUNT(DISTINCT t.id) = ?) m
"#;

const ALL_PEOPLE: &str = r#"
    SELECT p.id, p.name,
           CAST(to_json(coalesce(
               (SELECT list(t2.name)
                  FROM person_tag pt2
                  JOIN tag t2 ON t2.id = pt2.tag_id
                 WHERE pt2.person_id = p.id),
               []::VARCHAR[])) AS VARCHAR)
      FROM person p
"#;

/// Normalized layout on DuckDB.
pub struct DuckDbNormalizedModel {
    db: DuckDbHandle,
}

impl DuckDbNormalizedModel {
    /// Create a model over a shared connection.
    pub fn new(db: DuckDbHandle) -> Self {
        Self { db }
    }
}

/// Look up or create every tag in `tags`, returning name -> id.
///
/// Existing rows are only read, never rewritten.
fn upsert_tags(tx: &Transaction<'_>, tags: &[String]) -> Result<HashMap<String, i64>> {
    if tags.is_empty() {
        return Ok(HashMap::new());
    }
    let list = list_param(tags)?;

    tx.execute(
        "INSERT INTO tag (name)
         SELECT DISTINCT unnest(CAST(CAST(? AS JSON) AS VARCHAR[]))
         ON CONFLICT (name) DO NOTHING",
        params![list],
    )?;

    let mut select = tx.prepare_cached(
        "SELECT id, name FROM tag WHERE list_contains(CAST(CAST(? AS JSON) AS VARCHAR[]), name)",
    )?;
    let ids = select
        .query_map(params![list], |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(ids)
}

/// Link `person_id` to `tags`; links that already exist are kept.
fn link_tags(
    tx: &Transaction<'_>,
    person_id: i64,
    tags: &[String],
    ids: &HashMap<String, i64>,
) -> Result<()> {
    let mut link = tx.prepare_cached(
        "INSERT INTO person_tag (person_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING",
    )?;
    for tag in tags {
        link.execute(params![person_id, ids[tag]])?;
    }
    Ok(())
}

fn insert_person_row(tx: &Transaction<'_>, name: &str) -> Result<i64> {
    let mut insert = tx.prepare_cached("INSERT INTO person (name) VALUES (?) RETURNING id")?;
    Ok(insert.query_row(params![name], |row| row.get(0))?)
}

#[async_trait]
impl TagModel for DuckDbNormalizedModel {
    fn engine(&self) -> EngineKind {
        EngineKind::DuckDb
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Normalized
    }

    async fn setup(&self) -> Result<()> {
        self.db.with_conn(|conn| Ok(conn.execute_batch(SCHEMA)?))
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let tags = dedup_tags(tags);
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id = insert_person_row(&tx, name)?;
            let ids = upsert_tags(&tx, &tags)?;
            link_tags(&tx, id, &tags, &ids)?;
            tx.commit()?;

            Ok(Person {
                id,
                name: name.to_string(),
                tags,
            })
        })
    }

    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>> {
        let all_tags = distinct_tags(people);
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let ids = upsert_tags(&tx, &all_tags)?;

            let mut created = Vec::with_capacity(people.len());
            for person in people {
                let id = insert_person_row(&tx, &person.name)?;
                let tags = dedup_tags(&person.tags);
                link_tags(&tx, id, &tags, &ids)?;
                created.push(Person {
                    id,
                    name: person.name.clone(),
                    tags,
                });
            }
            tx.commit()?;

            Ok(created)
        })
    }

    // Only links that leave the set are deleted; a key deleted and
    // re-inserted in one transaction trips DuckDB's index check.
    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let tags = dedup_tags(tags);
        let keep = list_param(&tags)?;
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM person WHERE id = ?)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::PersonNotFound(id));
            }

            tx.execute(
                "DELETE FROM person_tag
                  WHERE person_id = ?
                    AND tag_id NOT IN (
                        SELECT id FROM tag
                         WHERE list_contains(CAST(CAST(? AS JSON) AS VARCHAR[]), name))",
                params![id, keep],
            )?;
            let ids = upsert_tags(&tx, &tags)?;
            link_tags(&tx, id, &tags, &ids)?;
            tx.commit()?;
            Ok(())
        })
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Person>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SEARCH_TAG)?;
            query_people(&mut stmt, params![tag])
        })
    }

    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>> {
        let wanted = dedup_tags(tags);
        if wanted.is_empty() {
            // Every tag set is a superset of the empty set.
            return self.db.with_conn(|conn| {
                let mut stmt = conn.prepare_cached(ALL_PEOPLE)?;
                query_people(&mut stmt, params![])
            });
        }

        let list = list_param(&wanted)?;
        let count = wanted.len() as i64;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SEARCH_TAGS_AND)?;
            query_people(&mut stmt, params![list, count])
        })
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        let list = list_param(tags)?;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SEARCH_TAGS_OR)?;
            query_people(&mut stmt, params![list])
        })
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        self.db.with_conn(|conn| {
            ids_in_order(conn, "SELECT id FROM person ORDER BY id LIMIT ?", limit)
        })
    }

    async fn count_persons(&self) -> Result<u64> {
        self.db
            .with_conn(|conn| count_rows(conn, "SELECT COUNT(*) FROM person"))
    }

    async fn cleanup(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "DELETE FROM person_tag;
                 DELETE FROM person;
                 DELETE FROM tag;",
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}
