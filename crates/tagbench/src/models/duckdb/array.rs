//! Array DuckDB model: tags in a native `VARCHAR[]` column.
//!
//! `list_contains`, `list_has_all` and `list_has_any` answer the three
//! search shapes directly on the stored list.

use async_trait::async_trait;
use duckdb::params;

use super::{count_rows, ids_in_order, list_param, query_people};
use crate::engine::{DuckDbHandle, EngineKind};
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, ModelKind, Person, TagModel};

// No primary key: DuckDB rewrites an update of a list column as delete plus
// insert, and older releases reject that against a key index.
const SCHEMA: &str = r#"
    CREATE SEQUENCE IF NOT EXISTS person_array_id_seq;

    CREATE TABLE IF NOT EXISTS person_array (
        id BIGINT NOT NULL DEFAULT nextval('person_array_id_seq'),
        name VARCHAR NOT NULL,
        tags VARCHAR[] NOT NULL
    );
"#;

const INSERT: &str = r#"
    INSERT INTO person_array (name, tags)
    VALUES (?, CAST(CAST(? AS JSON) AS VARCHAR[]))
    RETURNING id
"#;

const SEARCH_TAG: &str = r#"
    SELECT id, name, CAST(to_json(tags) AS VARCHAR)
      FROM person_array
     WHERE list_contains(tags, ?)
"#;

const SEARCH_TAGS_AND: &str = r#"
    SELECT id, name, CAST(to_json(tags) AS VARCHAR)
      FROM person_array
     WHERE list_has_all(tags, CAST(CAST(? AS JSON) AS VARCHAR[]))
"#;

const SEARCH_TAGS_OR: &str = r#"
    SELECT id, name, CAST(to_json(tags) AS VARCHAR)
      FROM person_array
     WHERE list_has_any(tags, CAST(CAST(? AS JSON) AS VARCHAR[]))
"#;

/// Array layout on DuckDB.
pub struct DuckDbArrayModel {
    db: DuckDbHandle,
}

impl DuckDbArrayModel {
    /// Create a model over a shared connection.
    pub fn new(db: DuckDbHandle) -> Self {
        Self { db }
    }

    fn search(&self, sql: &'static str, param: String) -> Result<Vec<Person>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            query_people(&mut stmt, params![param])
        })
    }
}

#[async_trait]
impl TagModel for DuckDbArrayModel {
    fn engine(&self) -> EngineKind {
        EngineKind::DuckDb
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Array
    }

    async fn setup(&self) -> Result<()> {
        self.db.with_conn(|conn| Ok(conn.execute_batch(SCHEMA)?))
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let tags = dedup_tags(tags);
        let list = list_param(&tags)?;
        self.db.with_conn(|conn| {
            let id: i64 = conn.query_row(INSERT, params![name, list], |row| row.get(0))?;
            Ok(Person {
                id,
                name: name.to_string(),
                tags,
            })
        })
    }

    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>> {
        let rows = people
            .iter()
            .map(|person| {
                let tags = dedup_tags(&person.tags);
                let list = list_param(&tags)?;
                Ok((person, tags, list))
            })
            .collect::<Result<Vec<_>>>()?;

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut created = Vec::with_capacity(rows.len());
            {
                let mut insert = tx.prepare_cached(INSERT)?;
                for (person, tags, list) in rows {
                    let id: i64 = insert.query_row(params![person.name, list], |row| row.get(0))?;
                    created.push(Person {
                        id,
                        name: person.name.clone(),
                        tags,
                    });
                }
            }
            tx.commit()?;
            Ok(created)
        })
    }

    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let list = list_param(&dedup_tags(tags))?;
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE person_array SET tags = CAST(CAST(? AS JSON) AS VARCHAR[]) WHERE id = ?",
                params![list, id],
            )?;
            if updated == 0 {
                return Err(Error::PersonNotFound(id));
            }
            Ok(())
        })
    }

    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Person>> {
        self.search(SEARCH_TAG, tag.to_string())
    }

    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.search(SEARCH_TAGS_AND, list_param(tags)?)
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.search(SEARCH_TAGS_OR, list_param(tags)?)
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        self.db.with_conn(|conn| {
            ids_in_order(conn, "SELECT id FROM person_array ORDER BY id LIMIT ?", limit)
        })
    }

    async fn count_persons(&self) -> Result<u64> {
        self.db
            .with_conn(|conn| count_rows(conn, "SELECT COUNT(*) FROM person_array"))
    }

    async fn cleanup(&self) -> Result<()> {
        self.db
            .with_conn(|conn| Ok(conn.execute_batch("DELETE FROM person_array;")?))
    }
}
