//! Document SQLite model: tags stored as a JSON array in a text column.
//!
//! SQLite has no containment operator for JSON, so every search expands the
//! stored array with `json_each` and checks each requested tag for
//! existence. AND is "no requested tag is missing", OR is "some stored tag
//! is requested".

use async_trait::async_trait;
use rusqlite::params;

use super::{id_column, query_people, tags_param};
use crate::engine::{EngineKind, SqliteHandle};
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS person_document (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        tags TEXT NOT NULL CHECK (json_valid(tags) AND json_type(tags) = 'array')
    );
"#;

const INSERT: &str = "INSERT INTO person_document (name, tags) VALUES (?1, ?2)";

const SEARCH_TAG: &str = r#"
    SELECT p.id, p.name, p.tags
      FROM person_document p
     WHERE EXISTS (SELECT 1 FROM json_each(p.tags) AS have WHERE have.value = ?1)
"#;

const SEARCH_TAGS_AND: &str = r#"
    SELECT p.id, p.name, p.tags
      FROM person_document p
     WHERE NOT EXISTS (
            SELECT 1
              FROM json_each(?1) AS want
             WHERE NOT EXISTS (
                    SELECT 1 FROM json_each(p.tags) AS have WHERE have.value = want.value))
"#;

const SEARCH_TAGS_OR: &str = r#"
    SELECT p.id, p.name, p.tags
      FROM person_document p
     WHERE EXISTS (
            SELECT 1
              FROM json_each(p.tags) AS have
              JOIN json_each(?1) AS want ON want.value = have.value)
"#;

/// Document layout on SQLite.
pub struct SqliteDocumentModel {
    db: SqliteHandle,
}

impl SqliteDocumentModel {
    /// Create a model over a shared connection.
    pub fn new(db: SqliteHandle) -> Self {
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
impl TagModel for SqliteDocumentModel {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Document
    }

    async fn setup(&self) -> Result<()> {
        self.db.with_conn(|conn| Ok(conn.execute_batch(SCHEMA)?))
    }

    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person> {
        let tags = dedup_tags(tags);
        let doc = tags_param(&tags)?;
        self.db.with_conn(|conn| {
            conn.execute(INSERT, params![name, doc])?;
            Ok(Person {
                id: conn.last_insert_rowid(),
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
                let doc = tags_param(&tags)?;
                Ok((person, tags, doc))
            })
            .collect::<Result<Vec<_>>>()?;

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut created = Vec::with_capacity(rows.len());
            {
                let mut insert = tx.prepare_cached(INSERT)?;
                for (person, tags, doc) in rows {
                    insert.execute(params![person.name, doc])?;
                    created.push(Person {
                        id: tx.last_insert_rowid(),
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
        let doc = tags_param(&dedup_tags(tags))?;
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE person_document SET tags = ?1 WHERE id = ?2",
                params![doc, id],
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
        self.search(SEARCH_TAGS_AND, tags_param(tags)?)
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        self.search(SEARCH_TAGS_OR, tags_param(tags)?)
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT id FROM person_document ORDER BY id LIMIT ?1")?;
            let ids = stmt
                .query_map([limit as i64], id_column)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    async fn count_persons(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM person_document", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    async fn cleanup(&self) -> Result<()> {
        self.db
            .with_conn(|conn| Ok(conn.execute_batch("DELETE FROM person_document;")?))
    }
}
