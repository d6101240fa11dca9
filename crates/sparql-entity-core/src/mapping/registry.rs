//! # Mapping Registry
//!
//! Thread-safe, build-once cache of entity type mappings.
//!
//! - First access to an entity type builds its mapping outside any lock,
//!   then publishes it; if two threads race, the first published mapping wins
//!   and both callers observe it. A partially built mapping is never visible.
//! - Built mappings are immutable and shared through `Arc`.
//! - Only an explicit invalidation (or a detected schema change) drops a
//!   cached mapping. A build that overlaps an invalidation is discarded and
//!   redone, so a stale mapping is never published after `invalidate`.
//! - An optional `MappingCache` lets a fresh process reuse snapshots built by
//!   an earlier one, as long as the schema fingerprint still matches.

use super::{EntityTypeMapping, FieldRef, InboundMap, MappingBuilder, OutboundMap};
use crate::format::ValueFormat;
use crate::schema::SchemaProvider;
use crate::storage::MappingCache;
use crate::{Bundle, EntityTypeId, Iri, MappingError};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Published mappings plus the invalidation counters guarding publication.
#[derive(Default)]
struct Built {
    mappings: BTreeMap<EntityTypeId, Arc<EntityTypeMapping>>,
    /// Bumped by `invalidate` of one entity type.
    generations: BTreeMap<EntityTypeId, u64>,
    /// Bumped by `invalidate_all`.
    epoch: u64,
}

impl Built {
    fn generation(&self, entity_type: &EntityTypeId) -> (u64, u64) {
        (
            self.epoch,
            self.generations.get(entity_type).copied().unwrap_or(0),
        )
    }
}

/// Build-once registry of entity type mappings.
pub struct MappingRegistry {
    provider: Arc<dyn SchemaProvider>,
    built: RwLock<Built>,
    cache: Option<Arc<dyn MappingCache>>,
}

impl fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("built", &self.built_entity_types())
            .field("persistent_cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl MappingRegistry {
    /// Create a registry reading declarations from `provider`.
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self {
            provider,
            built: RwLock::new(Built::default()),
            cache: None,
        }
    }

    /// Back the registry with a persistent snapshot cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn MappingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The schema provider this registry reads from.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn SchemaProvider> {
        &self.provider
    }

    // =========================================================================
    // BUILD / CACHE
    // =========================================================================

    /// The mapping of an entity type, building it on first access.
    ///
    /// If the entity type is invalidated while the build runs, the result is
    /// dropped and the build starts over from the provider's current schema.
    pub fn mapping(&self, entity_type: &EntityTypeId) -> Result<Arc<EntityTypeMapping>, MappingError> {
        loop {
            let generation = {
                let guard = self.built.read().unwrap_or_else(PoisonError::into_inner);
                if let Some(mapping) = guard.mappings.get(entity_type) {
                    return Ok(Arc::clone(mapping));
                }
                guard.generation(entity_type)
            };

            let built = Arc::new(self.load_or_build(entity_type)?);

            let mut guard = self.built.write().unwrap_or_else(PoisonError::into_inner);
            if guard.generation(entity_type) != generation {
                tracing::debug!(entity_type = %entity_type, "mapping invalidated during build, rebuilding");
                continue;
            }
            let published = guard
                .mappings
                .entry(entity_type.clone())
                .or_insert_with(|| Arc::clone(&built));
            return Ok(Arc::clone(published));
        }
    }

    /// Build the mapping of an entity type now. Idempotent.
    pub fn build_mapping(&self, entity_type: &EntityTypeId) -> Result<(), MappingError> {
        self.mapping(entity_type).map(|_| ())
    }

    /// Build every entity type the provider declares.
    pub fn warm(&self) -> Result<usize, MappingError> {
        let ids = self.provider.entity_type_ids();
        for id in &ids {
            self.build_mapping(id)?;
        }
        Ok(ids.len())
    }

    fn cached(&self, entity_type: &EntityTypeId) -> Option<Arc<EntityTypeMapping>> {
        self.built
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .mappings
            .get(entity_type)
            .cloned()
    }

    fn load_or_build(&self, entity_type: &EntityTypeId) -> Result<EntityTypeMapping, MappingError> {
        let schema = self
            .provider
            .entity_type(entity_type)
            .ok_or_else(|| MappingError::UnknownEntityType {
                entity_type: entity_type.clone(),
            })?;

        let Some(cache) = &self.cache else {
            return MappingBuilder::build(&schema);
        };

        let fingerprint = schema.fingerprint()?;
        if let Some(mapping) = cache.load(entity_type, fingerprint)? {
            tracing::debug!(entity_type = %entity_type, "loaded mapping snapshot from cache");
            return Ok(mapping);
        }

        let mapping = MappingBuilder::build(&schema)?;
        cache.store(&mapping)?;
        Ok(mapping)
    }

    /// Drop the cached mapping of one entity type (e.g. after a bundle was
    /// installed). The next access rebuilds it.
    pub fn invalidate(&self, entity_type: &EntityTypeId) -> Result<(), MappingError> {
        let removed = {
            let mut guard = self.built.write().unwrap_or_else(PoisonError::into_inner);
            *guard.generations.entry(entity_type.clone()).or_insert(0) += 1;
            guard.mappings.remove(entity_type).is_some()
        };
        if let Some(cache) = &self.cache {
            cache.remove(entity_type)?;
        }
        tracing::debug!(entity_type = %entity_type, removed, "invalidated mapping");
        Ok(())
    }

    /// Drop every cached mapping.
    pub fn invalidate_all(&self) -> Result<(), MappingError> {
        let ids: Vec<EntityTypeId> = {
            let mut guard = self.built.write().unwrap_or_else(PoisonError::into_inner);
            let ids = guard.mappings.keys().cloned().collect();
            guard.mappings.clear();
            guard.epoch += 1;
            ids
        };
        if let Some(cache) = &self.cache {
            for id in &ids {
                cache.remove(id)?;
            }
        }
        tracing::debug!(count = ids.len(), "invalidated all mappings");
        Ok(())
    }

    /// Rebuild the mapping if the provider's declaration changed since it was
    /// built. Returns whether a rebuild happened.
    pub fn refresh_if_changed(&self, entity_type: &EntityTypeId) -> Result<bool, MappingError> {
        let Some(current) = self.cached(entity_type) else {
            return Ok(false);
        };
        let schema = self
            .provider
            .entity_type(entity_type)
            .ok_or_else(|| MappingError::UnknownEntityType {
                entity_type: entity_type.clone(),
            })?;
        if schema.fingerprint()? == current.fingerprint() {
            return Ok(false);
        }
        self.invalidate(entity_type)?;
        self.build_mapping(entity_type)?;
        Ok(true)
    }

    /// Entity types with a built mapping.
    #[must_use]
    pub fn built_entity_types(&self) -> Vec<EntityTypeId> {
        self.built
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .mappings
            .keys()
            .cloned()
            .collect()
    }

    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// bundle -> field -> column -> declaration.
    pub fn outbound_map(&self, entity_type: &EntityTypeId) -> Result<Arc<OutboundMap>, MappingError> {
        Ok(self.mapping(entity_type)?.outbound())
    }

    /// predicate -> bundle -> (field, column).
    pub fn inbound_map(&self, entity_type: &EntityTypeId) -> Result<Arc<InboundMap>, MappingError> {
        Ok(self.mapping(entity_type)?.inbound())
    }

    /// Predicates of a field column, filtered by column and bundle when given.
    pub fn field_predicates(
        &self,
        entity_type: &EntityTypeId,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<BTreeSet<Iri>, MappingError> {
        self.mapping(entity_type)?
            .field_predicates(field, column, bundle)
    }

    /// Declared value formats of a field column.
    pub fn field_format(
        &self,
        entity_type: &EntityTypeId,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<BTreeSet<ValueFormat>, MappingError> {
        self.mapping(entity_type)?.field_formats(field, column, bundle)
    }

    /// The type URI of a bundle.
    pub fn bundle_to_type_uri(
        &self,
        entity_type: &EntityTypeId,
        bundle: &str,
    ) -> Result<Iri, MappingError> {
        self.mapping(entity_type)?
            .bundle_to_type_uri(bundle)
            .cloned()
    }

    /// Every bundle of the entity type declaring `uri`.
    pub fn type_uri_to_bundles(
        &self,
        entity_type: &EntityTypeId,
        uri: &str,
    ) -> Result<BTreeSet<Bundle>, MappingError> {
        Ok(self.mapping(entity_type)?.type_uri_to_bundles(uri))
    }

    /// The field a predicate holds for an entity of a known bundle.
    pub fn field_for_predicate(
        &self,
        entity_type: &EntityTypeId,
        predicate: &str,
        bundle: &str,
    ) -> Result<Option<FieldRef>, MappingError> {
        Ok(self
            .mapping(entity_type)?
            .field_for_predicate(predicate, bundle)?
            .cloned())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{
        BundleSchema, ColumnSchema, EntityTypeSchema, FieldSchema, StaticSchemaProvider,
    };
    use std::sync::{Mutex, mpsc};
    use std::thread;

    fn schema() -> EntityTypeSchema {
        EntityTypeSchema::new("content")
            .base_field(FieldSchema::new("title", "value").column(ColumnSchema::mapped(
                "value",
                "http://ex/title",
                ValueFormat::PlainLiteral,
            )))
            .bundle(BundleSchema::new("article", "http://ex/Article"))
    }

    fn registry() -> (Arc<StaticSchemaProvider>, MappingRegistry) {
        let provider = Arc::new(StaticSchemaProvider::from_schemas([schema()]));
        let registry = MappingRegistry::new(provider.clone());
        (provider, registry)
    }

    #[test]
    fn mapping_is_built_once_and_shared() {
        let (_, registry) = registry();
        let id = EntityTypeId::from("content");

        let first = registry.mapping(&id).expect("first");
        let second = registry.mapping(&id).expect("second");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unknown_entity_type_fails() {
        let (_, registry) = registry();
        let result = registry.mapping(&EntityTypeId::from("user"));
        assert!(matches!(result, Err(MappingError::UnknownEntityType { .. })));
        assert!(registry.built_entity_types().is_empty());
    }

    #[test]
    fn concurrent_first_access_publishes_one_mapping() {
        let (_, registry) = registry();
        let registry = Arc::new(registry);
        let id = EntityTypeId::from("content");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                thread::spawn(move || registry.mapping(&id).expect("mapping"))
            })
            .collect();
        let mappings: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .collect();

        let published = registry.mapping(&id).expect("mapping");
        for mapping in &mappings {
            assert!(Arc::ptr_eq(mapping, &published));
        }
    }

    #[test]
    fn new_bundle_visible_after_invalidate() {
        let (provider, registry) = registry();
        let id = EntityTypeId::from("content");
        registry.build_mapping(&id).expect("build");

        provider.upsert(schema().bundle(BundleSchema::new("page", "http://ex/Page")));
        assert!(registry.bundle_to_type_uri(&id, "page").is_err());

        registry.invalidate(&id).expect("invalidate");
        let uri = registry.bundle_to_type_uri(&id, "page").expect("page");
        assert_eq!(uri.as_str(), "http://ex/Page");
    }

    #[test]
    fn refresh_detects_schema_change() {
        let (provider, registry) = registry();
        let id = EntityTypeId::from("content");
        registry.build_mapping(&id).expect("build");

        assert!(!registry.refresh_if_changed(&id).expect("refresh"));
        provider.upsert(schema().bundle(BundleSchema::new("page", "http://ex/Page")));
        assert!(registry.refresh_if_changed(&id).expect("refresh"));
        assert!(registry.type_uri_to_bundles(&id, "http://ex/Page").expect("bundles").contains("page"));
    }

    /// Serves the schema as read on first access, but holds that first
    /// read until released.
    struct GatedProvider {
        inner: Arc<StaticSchemaProvider>,
        started: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl SchemaProvider for GatedProvider {
        fn entity_type(&self, id: &EntityTypeId) -> Option<EntityTypeSchema> {
            let schema = self.inner.entity_type(id);
            let started = self.started.lock().expect("lock").take();
            let release = self.release.lock().expect("lock").take();
            if let (Some(started), Some(release)) = (started, release) {
                started.send(()).expect("signal");
                release.recv().expect("release");
            }
            schema
        }

        fn entity_type_ids(&self) -> Vec<EntityTypeId> {
            self.inner.entity_type_ids()
        }
    }

    #[test]
    fn invalidate_during_build_discards_stale_mapping() {
        let inner = Arc::new(StaticSchemaProvider::from_schemas([schema()]));
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = GatedProvider {
            inner: Arc::clone(&inner),
            started: Mutex::new(Some(started_tx)),
            release: Mutex::new(Some(release_rx)),
        };
        let registry = Arc::new(MappingRegistry::new(Arc::new(provider)));
        let id = EntityTypeId::from("content");

        let builder = {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            thread::spawn(move || registry.mapping(&id).expect("mapping"))
        };

        started_rx.recv().expect("build started");
        inner.upsert(schema().bundle(BundleSchema::new("page", "http://ex/Page")));
        registry.invalidate(&id).expect("invalidate");
        release_tx.send(()).expect("release");

        let returned = builder.join().expect("join");
        assert!(returned.bundle_to_type_uri("page").is_ok());
        let uri = registry.bundle_to_type_uri(&id, "page").expect("page");
        assert_eq!(uri.as_str(), "http://ex/Page");
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let (_, registry) = registry();
        assert_eq!(registry.warm().expect("warm"), 1);
        registry.invalidate_all().expect("invalidate");
        assert!(registry.built_entity_types().is_empty());
    }
}
