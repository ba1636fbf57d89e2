//! Normalized SQLite model: `person`, `tag`, `person_tag`.

use std::collections::HashMap;

use async_trait::async_trait;
use rusqlite::{params, Transaction};

use super::{id_column, query_people, tags_param};
use crate::engine::{EngineKind, SqliteHandle};
use crate::error::{Error, Result};
use crate::fixtures::PersonData;
use crate::models::{dedup_tags, distinct_tags, ModelKind, Person, TagModel};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS person (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tag (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS person_tag (
        person_id INTEGER NOT NULL REFERENCES person(id),
        tag_id INTEGER NOT NULL REFERENCES tag(id),
        PRIMARY KEY (person_id, tag_id)
    );

    CREATE INDEX IF NOT EXISTS idx_person_tag_tag ON person_tag(tag_id);
"#;

const SEARCH_TAG: &str = r#"
    SELECT m.id, m.name,
           (SELECT json_group_array(t2.name)
              FROM person_tag pt2
              JOIN tag t2 ON t2.id = pt2.tag_id
             WHERE pt2.person_id = m.id)
      FROM (SELECT DISTINCT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE t.name = ?1) m
"#;

const SEARCH_TAGS_OR: &str = r#"
    SELECT m.id, m.name,
           (SELECT json_group_array(t2.name)
              FROM person_tag pt2
              JOIN tag t2 ON t2.id = pt2.tag_id
             WHERE pt2.person_id = m.id)
      FROM (SELECT DISTINCT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE t.name IN (SELECT value FROM json_each(?1))) m
"#;

// One pass over the join table: a person matches when the number of distinct
// requested tags it carries equals the number requested.
const SEARCH_TAGS_AND: &str = r#"
    SELECT m.id, m.name,
           (SELECT json_group_array(t2.name)
              FROM person_tag pt2
              JOIN tag t2 ON t2.id = pt2.tag_id
             WHERE pt2.person_id = m.id)
      FROM (SELECT p.id, p.name
              FROM person p
              JOIN person_tag pt ON pt.person_id = p.id
              JOIN tag t ON t.id = pt.tag_id
             WHERE t.name IN (SELECT value FROM json_each(?1))
             GROUP BY p.id, p.name
            HAVING COUNT(DISTINCT t.id) = ?2) m
"#;

const ALL_PEOPLE: &str = r#"
    SELECT p.id, p.name,
           (SELECT json_group_array(t2.name)
              FROM person_tag pt2
              JOIN tag t2 ON t2.id = pt2.tag_id
             WHERE pt2.person_id = p.id)
      FROM person p
"#;

/// Normalized layout on SQLite.
pub struct SqliteNormalizedModel {
    db: SqliteHandle,
}

impl SqliteNormalizedModel {
    /// Create a model over a shared connection.
    pub fn new(db: SqliteHandle) -> Self {
        Self { db }
    }
}

/// Look up or create every tag in `tags`, returning name -> id.
///
/// `tags` must already be free of duplicates.
fn upsert_tags(tx: &Transaction<'_>, tags: &[String]) -> Result<HashMap<String, i64>> {
    let mut insert =
        tx.prepare_cached("INSERT INTO tag (name) VALUES (?1) ON CONFLICT(name) DO NOTHING")?;
    let mut select = tx.prepare_cached("SELECT id FROM tag WHERE name = ?1")?;

    let mut ids = HashMap::with_capacity(tags.len());
    for tag in tags {
        insert.execute([tag])?;
        let id = select.query_row([tag], id_column)?;
        ids.insert(tag.clone(), id);
    }
    Ok(ids)
}

fn link_tags(
    tx: &Transaction<'_>,
    person_id: i64,
    tags: &[String],
    ids: &HashMap<String, i64>,
) -> Result<()> {
    let mut link =
        tx.prepare_cached("INSERT INTO person_tag (person_id, tag_id) VALUES (?1, ?2)")?;
    for tag in tags {
        link.execute([person_id, ids[tag]])?;
    }
    Ok(())
}

#[async_trait]
impl TagModel for SqliteNormalizedModel {
    fn engine(&self) -> EngineKind {
        EngineKind::Sqlite
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
            tx.execute("INSERT INTO person (name) VALUES (?1)", [name])?;
            let id = tx.last_insert_rowid();

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
            {
                let mut insert = tx.prepare_cached("INSERT INTO person (name) VALUES (?1)")?;
                for person in people {
                    insert.execute([&person.name])?;
                    let id = tx.last_insert_rowid();
                    let tags = dedup_tags(&person.tags);
                    link_tags(&tx, id, &tags, &ids)?;
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
        let tags = dedup_tags(tags);
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM person WHERE id = ?1)",
                [id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::PersonNotFound(id));
            }

            tx.execute("DELETE FROM person_tag WHERE person_id = ?1", [id])?;
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

        let param = tags_param(&wanted)?;
        let count = wanted.len() as i64;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SEARCH_TAGS_AND)?;
            query_people(&mut stmt, params![param, count])
        })
    }

    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>> {
        let param = tags_param(tags)?;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(SEARCH_TAGS_OR)?;
            query_people(&mut stmt, params![param])
        })
    }

    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT id FROM person ORDER BY id LIMIT ?1")?;
            let ids = stmt
                .query_map([limit as i64], id_column)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    async fn count_persons(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM person", [], |row| row.get(0))?;
            Ok(count as u64)
        })
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
