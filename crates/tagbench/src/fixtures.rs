//! Synthetic person data for benchmarks.
//!
//! Generation is seeded so two runs with the same seed produce the same
//! records in the same order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// Fixed tag vocabulary every generated person draws from.
pub const TAG_POOL: [&str; 15] = [
    "engineer",
    "remote",
    "frontend",
    "backend",
    "manager",
    "senior",
    "junior",
    "fullstack",
    "devops",
    "qa",
    "designer",
    "product",
    "marketing",
    "sales",
    "support",
];

/// Fewest tags a generated person carries.
pub const MIN_TAGS: usize = 5;

/// Most tags a generated person carries.
pub const MAX_TAGS: usize = 15;

/// Default generator seed.
pub const DEFAULT_SEED: u64 = 42;

/// Person record before it has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonData {
    pub name: String,
    pub tags: Vec<String>,
}

impl PersonData {
    /// Build a record from a name and tag list.
    pub fn new<S: Into<String>>(name: impl Into<String>, tags: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Seeded generator for person records.
///
/// Names keep counting across calls, so every record produced by one
/// generator has a distinct name.
pub struct PersonGenerator {
    rng: StdRng,
    next_index: usize,
}

impl PersonGenerator {
    /// Create a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_index: 1,
        }
    }

    /// Generate `count` people with random tag sets.
    pub fn people(&mut self, count: usize) -> Vec<PersonData> {
        (0..count)
            .map(|_| {
                let name = format!("Person {}", self.next_index);
                self.next_index += 1;
                PersonData {
                    name,
                    tags: self.tags(),
                }
            })
            .collect()
    }

    /// Generate one random tag set of `MIN_TAGS..=MAX_TAGS` distinct tags.
    pub fn tags(&mut self) -> Vec<String> {
        let count = self.rng.gen_range(MIN_TAGS..=MAX_TAGS);
        TAG_POOL
            .choose_multiple(&mut self.rng, count)
            .map(|tag| tag.to_string())
            .collect()
    }
}

impl Default for PersonGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// Generate `count` people with the default seed.
pub fn generate_people(count: usize) -> Vec<PersonData> {
    PersonGenerator::default().people(count)
}
