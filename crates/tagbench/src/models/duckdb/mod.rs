//! DuckDB models.
//!
//! Tag lists are bound as JSON text and cast to `VARCHAR[]` inside the query,
//! and read back through `to_json`, so no list type crosses the driver.

mod array;
mod document;
mod normalized;

pub use array::DuckDbArrayModel;
pub use document::DuckDbDocumentModel;
pub use normalized::DuckDbNormalizedModel;

use duckdb::{params, Connection, Row, Statement, ToSql};

use crate::error::Result;
use crate::models::Person;

/// Encode a list as a JSON array parameter.
fn list_param<T: serde::Serialize>(items: &[T]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
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

fn id_column(row: &Row<'_>) -> duckdb::Result<i64> {
    row.get(0)
}

/// Run an id query with a single `LIMIT ?` parameter.
fn ids_in_order(conn: &Connection, sql: &str, limit: usize) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map(params![limit as i64], id_column)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn count_rows(conn: &Connection, sql: &str) -> Result<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}
