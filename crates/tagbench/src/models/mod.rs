//! Tag storage models.
//!
//! Every model stores the same logical data (people carrying a set of tags)
//! in a different physical layout and answers the same three searches:
//!
//! - **Normalized**: `person`, `tag` and a `person_tag` join table
//! - **Array**: a native array column of tag names
//! - **Document**: a JSON array of tag names
//!
//! The [`TagModel`] trait is the contract the benchmark runner drives.

pub mod sqlite;

#[cfg(feature = "duckdb")]
pub mod duckdb;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

use crate::engine::EngineKind;
use crate::error::{Error, Result};
use crate::fixtures::PersonData;

/// Physical representation of the person/tag relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Normalized,
    Array,
    Document,
}

impl ModelKind {
    /// Every known model, in run order.
    pub const ALL: [ModelKind; 3] = [ModelKind::Normalized, ModelKind::Array, ModelKind::Document];

    /// Lowercase model name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Normalized => "normalized",
            ModelKind::Array => "array",
            ModelKind::Document => "document",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normalized" => Ok(ModelKind::Normalized),
            "array" => Ok(ModelKind::Array),
            "document" | "jsonb" | "json" => Ok(ModelKind::Document),
            other => Err(Error::Config(format!("unknown model: {}", other))),
        }
    }
}

/// A stored person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
}

impl Person {
    /// Tags as a set, for order-insensitive comparison.
    pub fn tag_set(&self) -> HashSet<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

/// Contract every storage model implements.
///
/// Models borrow an engine connection owned by [`crate::engine::Engines`];
/// they never close it. Multi-statement operations run in one transaction.
#[async_trait]
pub trait TagModel: Send + Sync {
    /// Engine this model runs against.
    fn engine(&self) -> EngineKind;

    /// Physical layout of this model.
    fn kind(&self) -> ModelKind;

    /// Create tables and indexes if they do not exist.
    async fn setup(&self) -> Result<()>;

    /// Store one person with the given tags.
    async fn insert_person(&self, name: &str, tags: &[String]) -> Result<Person>;

    /// Store many people atomically. Results follow input order.
    async fn insert_persons_batch(&self, people: &[PersonData]) -> Result<Vec<Person>>;

    /// Replace a person's whole tag set.
    async fn update_person_tags(&self, id: i64, tags: &[String]) -> Result<()>;

    /// People carrying `tag`.
    async fn search_by_tag(&self, tag: &str) -> Result<Vec<Person>>;

    /// People carrying every tag in `tags`.
    async fn search_by_tags_and(&self, tags: &[String]) -> Result<Vec<Person>>;

    /// People carrying at least one tag in `tags`.
    async fn search_by_tags_or(&self, tags: &[String]) -> Result<Vec<Person>>;

    /// Up to `limit` stored person ids, ascending.
    async fn person_ids(&self, limit: usize) -> Result<Vec<i64>>;

    /// Number of stored people.
    async fn count_persons(&self) -> Result<u64>;

    /// Remove every person, tag and association of this model.
    async fn cleanup(&self) -> Result<()>;
}

/// Remove repeated tags, keeping the first occurrence of each.
pub fn dedup_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(tags.len());
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Every distinct tag name across a batch, in first-seen order.
///
/// Upserting this list instead of per-record tags guarantees one tag row
/// per name even when thousands of records share it.
pub fn distinct_tags(people: &[PersonData]) -> Vec<String> {
    let mut seen = HashSet::new();
    people
        .iter()
        .flat_map(|person| person.tags.iter())
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dedup_tags_keeps_first_occurrence() {
        let input = tags(&["qa", "remote", "qa", "sales", "remote"]);
        assert_eq!(dedup_tags(&input), tags(&["qa", "remote", "sales"]));
        assert!(dedup_tags(&[]).is_empty());
    }

    #[test]
    fn test_distinct_tags_across_batch() {
        let people: Vec<PersonData> = (0..1000)
            .map(|i| PersonData::new(format!("Person {}", i), ["engineer", "remote"]))
            .chain(std::iter::once(PersonData::new("Extra", ["qa", "engineer"])))
            .collect();

        assert_eq!(distinct_tags(&people), tags(&["engineer", "remote", "qa"]));
    }

    #[test]
    fn test_distinct_tags_empty_batch() {
        assert!(distinct_tags(&[]).is_empty());
        assert!(distinct_tags(&[PersonData::new("Tagless", Vec::<String>::new())]).is_empty());
    }

    #[test]
    fn test_model_names() {
        assert_eq!("jsonb".parse::<ModelKind>().unwrap(), ModelKind::Document);
        assert_eq!("Array".parse::<ModelKind>().unwrap(), ModelKind::Array);
        assert!("graph".parse::<ModelKind>().is_err());
        assert_eq!(ModelKind::Normalized.to_string(), "normalized");
    }

    #[test]
    fn test_person_tag_set() {
        let person = Person {
            id: 1,
            name: "Person 1".into(),
            tags: tags(&["b", "a"]),
        };
        assert!(person.tag_set().contains("a"));
        assert_eq!(person.tag_set().len(), 2);
    }
}
