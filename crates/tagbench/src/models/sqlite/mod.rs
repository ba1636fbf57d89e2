//! SQLite models.
//!
//! SQLite has no array column type, so only the normalized and document
//! layouts exist here. Tag lists travel as JSON text and are expanded with
//! `json_each` inside queries.

mod document;
mod normalized;

pub use document::SqliteDocumentModel;
pub use normalized::SqliteNormalizedModel;

use rusqlite::{Row, Statement, ToSql};

use crate::error::Result;
use crate::models::Person;

/// Encode a tag list as a JSON array parameter.
fn tags_param(tags: &[String]) -> Result<String> {
    Ok(serde_json::to_string(tags)?)
}

/// Run a query whose rows are `(id, name, tags_json)`.
fn query_people(stmt: &mut Statement<'_>, params: &[&dyn ToSql]) -> Result<Vec<Person>> {
    let rows = stmt
        .query_map(params, |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name, tags)| {
            Ok(Person {
                id,
                name,
                tags: serde_json::from_str(&tags)?,
            })
        })
        .collect()
}

/// Read a single `id` column.
fn id_column(row: &Row<'_>) -> rusqlite::Result<i64> {
    row.get(0)
}
