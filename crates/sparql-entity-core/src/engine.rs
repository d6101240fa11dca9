//! # Engine
//!
//! The assembled engine: mapping registry, value codec, graph resolver and
//! identifier dispatcher built from one `EngineConfig`. This is the surface
//! an entity storage layer holds on to for the process lifetime.

use crate::codec::ValueCodec;
use crate::config::EngineConfig;
use crate::graph::{GraphConfig, GraphResolver, SparqlEntity};
use crate::identifier::IdentifierDispatcher;
use crate::mapping::MappingRegistry;
use crate::storage::{MappingCache, RedbMappingCache};
use crate::{EntityId, MappingError};
use std::sync::Arc;

/// All engine components, sharing one mapping registry.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<MappingRegistry>,
    codec: ValueCodec,
    graphs: GraphResolver,
    identifiers: IdentifierDispatcher,
}

impl Engine {
    /// Build the engine from a configuration.
    ///
    /// Opens the snapshot cache when `snapshot_cache` is configured.
    pub fn from_config(config: &EngineConfig) -> Result<Self, MappingError> {
        let cache = match &config.snapshot_cache {
            Some(path) => Some(Arc::new(RedbMappingCache::open(path)?) as Arc<dyn MappingCache>),
            None => None,
        };
        Self::build(config, cache, |_| {})
    }

    /// Build the engine with an explicit cache and a graph alteration hook.
    ///
    /// The hook runs once, before the graph resolver validates the graph
    /// configuration.
    pub fn build<F>(
        config: &EngineConfig,
        cache: Option<Arc<dyn MappingCache>>,
        alter_graphs: F,
    ) -> Result<Self, MappingError>
    where
        F: FnOnce(&mut GraphConfig),
    {
        config.validate()?;

        let mut registry = MappingRegistry::new(config.schema_provider());
        if let Some(cache) = cache {
            registry = registry.with_cache(cache);
        }
        let registry = Arc::new(registry);
        let graphs = GraphResolver::with_alter(config.graph_config(), alter_graphs)?;
        let identifiers = config.identifier_dispatcher()?;

        tracing::debug!(
            entity_types = config.entity_types.len(),
            graphs = graphs.config().definitions.len(),
            "engine assembled"
        );
        Ok(Self {
            codec: ValueCodec::new(Arc::clone(&registry)),
            registry,
            graphs,
            identifiers,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    #[must_use]
    pub fn graphs(&self) -> &GraphResolver {
        &self.graphs
    }

    #[must_use]
    pub fn identifiers(&self) -> &IdentifierDispatcher {
        &self.identifiers
    }

    /// Build every declared mapping now, so invalid declarations fail at
    /// startup instead of on first use.
    pub fn warm(&self) -> Result<usize, MappingError> {
        self.registry.warm()
    }

    /// The id of `entity`, generating one if it has none yet.
    pub fn ensure_id(&self, entity: &dyn SparqlEntity) -> Result<EntityId, MappingError> {
        match entity.id() {
            Some(id) => Ok(id.clone()),
            None => self.identifiers.generate(entity),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
