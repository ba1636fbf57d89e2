//! PostgreSQL models.
//!
//! All three layouts live side by side in one database:
//!
//! - `person` / `tag` / `person_tag` for the normalized model
//! - `person_array` with a `TEXT[]` column and a GIN index
//! - `person_document` with a `JSONB` column and a GIN index
//!
//! Batch inserts reserve ids from the table's sequence up front, so the
//! returned people match input order without relying on `RETURNING` order.

mod array;
mod document;
mod normalized;

pub use array::PgArrayModel;
pub use document::PgDocumentModel;
pub use normalized::PgNormalizedModel;

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, Row};

use crate::error::Result;
use crate::models::Person;

/// Rows per multi-row `INSERT`, keeping bind parameters under the protocol limit.
const INSERT_CHUNK_ROWS: usize = 10_000;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Allocate `count` ids from the serial sequence behind `table.id`.
async fn reserve_ids(conn: &mut PgConnection, table: &str, count: usize) -> Result<Vec<i64>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut ids: Vec<i64> = sqlx::query_scalar(
        "SELECT nextval(pg_get_serial_sequence($1, 'id')) FROM generate_series(1, $2)",
    )
    .bind(table)
    .bind(count as i64)
    .fetch_all(conn)
    .await?;

    ids.sort_unstable();
    Ok(ids)
}

/// Map a row with `id`, `name` and a `TEXT[]` `tags` column.
fn person_from_array_row(row: &PgRow) -> Result<Person> {
    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tags: row.try_get("tags")?,
    })
}

/// Map a row with `id`, `name` and a `JSONB` `tags` column.
fn person_from_document_row(row: &PgRow) -> Result<Person> {
    let Json(tags): Json<Vec<String>> = row.try_get("tags")?;
    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        tags,
    })
}
