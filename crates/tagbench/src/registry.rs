//! Model lookup by `(engine, model)`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::is_supported;
use crate::engine::{EngineKind, Engines};
use crate::error::{Error, Result};
use crate::models::sqlite::{SqliteDocumentModel, SqliteNormalizedModel};
use crate::models::{ModelKind, TagModel};

#[cfg(feature = "duckdb")]
use crate::models::duckdb::{DuckDbArrayModel, DuckDbDocumentModel, DuckDbNormalizedModel};
#[cfg(feature = "postgres")]
use crate::models::postgres::{PgArrayModel, PgDocumentModel, PgNormalizedModel};

/// Models available for one run, keyed by engine and model.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<(EngineKind, ModelKind), Arc<dyn TagModel>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every model whose engine is connected in `engines`.
    pub fn build(engines: &Engines) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        if let Ok(pool) = engines.postgres() {
            registry.register(Arc::new(PgNormalizedModel::new(pool.clone())));
            registry.register(Arc::new(PgArrayModel::new(pool.clone())));
            registry.register(Arc::new(PgDocumentModel::new(pool.clone())));
        }

        #[cfg(feature = "duckdb")]
        if let Ok(handle) = engines.duckdb() {
            registry.register(Arc::new(DuckDbNormalizedModel::new(handle.clone())));
            registry.register(Arc::new(DuckDbArrayModel::new(handle.clone())));
            registry.register(Arc::new(DuckDbDocumentModel::new(handle.clone())));
        }

        if let Ok(handle) = engines.sqlite() {
            registry.register(Arc::new(SqliteNormalizedModel::new(handle.clone())));
            registry.register(Arc::new(SqliteDocumentModel::new(handle.clone())));
        }

        tracing::debug!(models = registry.len(), "model registry built");
        registry
    }

    /// Add a model, replacing any previous one for the same pair.
    pub fn register(&mut self, model: Arc<dyn TagModel>) {
        self.models.insert((model.engine(), model.kind()), model);
    }

    /// Whether a model is registered for the pair.
    pub fn supports(&self, engine: EngineKind, model: ModelKind) -> bool {
        self.models.contains_key(&(engine, model))
    }

    /// The model for the pair.
    ///
    /// A pair no engine can host is [`Error::Unsupported`]; a hostable pair
    /// whose engine was never connected is [`Error::EngineNotInitialized`].
    pub fn get(&self, engine: EngineKind, model: ModelKind) -> Result<Arc<dyn TagModel>> {
        if let Some(found) = self.models.get(&(engine, model)) {
            return Ok(Arc::clone(found));
        }
        if is_supported(engine, model) {
            Err(Error::EngineNotInitialized(engine))
        } else {
            Err(Error::Unsupported { engine, model })
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
