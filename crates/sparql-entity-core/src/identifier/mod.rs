//! # Identifier Module
//!
//! Pluggable identifier generation for new entities.
//!
//! Strategies are registered by id. Declarations bind a strategy to bundles
//! of an entity type. The dispatcher picks the first declaration covering an
//! entity's bundle and caches the choice per (entity type, bundle); bundles
//! nobody declares use the fallback strategy.

mod strategies;

pub use strategies::{HashedStrategy, UuidStrategy};

use crate::graph::SparqlEntity;
use crate::{Bundle, EntityId, EntityTypeId, MappingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Generates subject URIs for new entities.
pub trait IdentifierStrategy: Send + Sync + fmt::Debug {
    /// Registry id of the strategy (e.g. `uuid`).
    fn id(&self) -> &str;

    /// Produce an identifier for `entity`. Uniqueness is the strategy's
    /// responsibility.
    fn generate(&self, entity: &dyn SparqlEntity) -> Result<EntityId, MappingError>;
}

/// Binds a registered strategy to bundles of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDeclaration {
    pub strategy: String,
    pub entity_type: EntityTypeId,
    pub bundles: Vec<Bundle>,
}

impl StrategyDeclaration {
    pub fn new<I, B>(strategy: impl Into<String>, entity_type: impl Into<EntityTypeId>, bundles: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bundle>,
    {
        Self {
            strategy: strategy.into(),
            entity_type: entity_type.into(),
            bundles: bundles.into_iter().map(Into::into).collect(),
        }
    }

    fn covers(&self, entity_type: &EntityTypeId, bundle: &Bundle) -> bool {
        &self.entity_type == entity_type && self.bundles.contains(bundle)
    }
}

// =============================================================================
// DISPATCHER
// =============================================================================

type SelectionKey = (EntityTypeId, Bundle);

/// Selects and runs the identifier strategy of an entity's bundle.
#[derive(Debug)]
pub struct IdentifierDispatcher {
    strategies: BTreeMap<String, Arc<dyn IdentifierStrategy>>,
    declarations: Vec<StrategyDeclaration>,
    fallback: Arc<dyn IdentifierStrategy>,
    selected: RwLock<BTreeMap<SelectionKey, Arc<dyn IdentifierStrategy>>>,
}

impl Default for IdentifierDispatcher {
    /// `uuid` (URN form) as fallback, `hashed` registered, no declarations.
    fn default() -> Self {
        Self::new(Arc::new(UuidStrategy::default()))
            .with_strategy(Arc::new(HashedStrategy::new("urn:sparql-entity")))
    }
}

impl IdentifierDispatcher {
    /// Create a dispatcher around a fallback strategy. The fallback is also
    /// registered under its own id.
    pub fn new(fallback: Arc<dyn IdentifierStrategy>) -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert(fallback.id().to_string(), Arc::clone(&fallback));
        Self {
            strategies,
            declarations: Vec::new(),
            fallback,
            selected: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a strategy under its id, replacing any previous one.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Arc<dyn IdentifierStrategy>) -> Self {
        self.strategies.insert(strategy.id().to_string(), strategy);
        self.clear_selection();
        self
    }

    /// Add a declaration. The strategy must already be registered.
    pub fn declare(mut self, declaration: StrategyDeclaration) -> Result<Self, MappingError> {
        if !self.strategies.contains_key(&declaration.strategy) {
            return Err(MappingError::InvalidConfig(format!(
                "identifier strategy {} is not registered",
                declaration.strategy
            )));
        }
        self.declarations.push(declaration);
        self.clear_selection();
        Ok(self)
    }

    #[must_use]
    pub fn fallback(&self) -> &Arc<dyn IdentifierStrategy> {
        &self.fallback
    }

    /// Registered strategy ids.
    pub fn strategy_ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    #[must_use]
    pub fn declarations(&self) -> &[StrategyDeclaration] {
        &self.declarations
    }

    /// The strategy for an entity's bundle. Never fails: undeclared bundles
    /// get the fallback.
    pub fn plugin(&self, entity: &dyn SparqlEntity) -> Arc<dyn IdentifierStrategy> {
        let key = (entity.entity_type_id().clone(), entity.bundle().clone());
        if let Some(strategy) = self
            .selected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(strategy);
        }

        let strategy = self
            .declarations
            .iter()
            .find(|d| d.covers(&key.0, &key.1))
            .and_then(|d| self.strategies.get(&d.strategy))
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone);
        tracing::debug!(
            entity_type = %key.0,
            bundle = %key.1,
            strategy = strategy.id(),
            "identifier strategy selected"
        );

        let mut selected = self.selected.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(selected.entry(key).or_insert(strategy))
    }

    /// Generate an identifier for a new entity.
    ///
    /// If the selected strategy fails or yields an empty id, the fallback is
    /// tried. A fallback failure is returned as `IdentifierGeneration`.
    pub fn generate(&self, entity: &dyn SparqlEntity) -> Result<EntityId, MappingError> {
        let strategy = self.plugin(entity);
        match usable(strategy.as_ref(), entity) {
            Ok(id) => return Ok(id),
            Err(e) if strategy.id() == self.fallback.id() => return Err(e),
            Err(e) => {
                tracing::debug!(
                    strategy = strategy.id(),
                    fallback = self.fallback.id(),
                    error = %e,
                    "identifier strategy failed, using fallback"
                );
            }
        }
        usable(self.fallback.as_ref(), entity)
    }

    fn clear_selection(&self) {
        self.selected
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Run a strategy, rejecting empty ids.
fn usable(
    strategy: &dyn IdentifierStrategy,
    entity: &dyn SparqlEntity,
) -> Result<EntityId, MappingError> {
    let id = strategy.generate(entity)?;
    if id.as_str().trim().is_empty() {
        return Err(MappingError::IdentifierGeneration {
            entity_type: entity.entity_type_id().clone(),
            bundle: entity.bundle().clone(),
            strategy: strategy.id().to_string(),
            reason: "strategy produced an empty identifier".to_string(),
        });
    }
    Ok(id)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityStub;

    #[derive(Debug)]
    struct Fixed(&'static str, &'static str);

    impl IdentifierStrategy for Fixed {
        fn id(&self) -> &str {
            self.0
        }

        fn generate(&self, _entity: &dyn SparqlEntity) -> Result<EntityId, MappingError> {
            Ok(EntityId::from(self.1))
        }
    }

    fn dispatcher() -> IdentifierDispatcher {
        IdentifierDispatcher::default()
            .declare(StrategyDeclaration::new("hashed", "content", ["article"]))
            .expect("declare")
    }

    #[test]
    fn declared_bundle_uses_declared_strategy() {
        let entity = EntityStub::new("content", "article").with_label("Hello");
        assert_eq!(dispatcher().plugin(&entity).id(), "hashed");
    }

    #[test]
    fn undeclared_bundle_uses_fallback() {
        let entity = EntityStub::new("content", "orphan_bundle");
        let dispatcher = dispatcher();
        let plugin = dispatcher.plugin(&entity);
        assert_eq!(plugin.id(), "uuid");
        assert!(!plugin.generate(&entity).expect("id").as_str().is_empty());
    }

    #[test]
    fn same_bundle_other_type_not_covered() {
        let entity = EntityStub::new("user", "article");
        assert_eq!(dispatcher().plugin(&entity).id(), "uuid");
    }

    #[test]
    fn failing_strategy_falls_back() {
        let entity = EntityStub::new("content", "article");
        let id = dispatcher().generate(&entity).expect("fallback id");
        assert!(id.as_str().starts_with("urn:uuid:"));
    }

    #[test]
    fn failing_fallback_propagates() {
        let dispatcher = IdentifierDispatcher::new(Arc::new(Fixed("blank", "  ")));
        let result = dispatcher.generate(&EntityStub::new("content", "article"));
        assert!(matches!(
            result,
            Err(MappingError::IdentifierGeneration { ref strategy, .. }) if strategy == "blank"
        ));
    }

    #[test]
    fn declaring_unregistered_strategy_rejected() {
        let result = IdentifierDispatcher::default()
            .declare(StrategyDeclaration::new("sequential", "content", ["article"]));
        assert!(matches!(result, Err(MappingError::InvalidConfig(_))));
    }

    #[test]
    fn registering_strategy_clears_cached_selection() {
        let entity = EntityStub::new("content", "article");
        let dispatcher = IdentifierDispatcher::default()
            .with_strategy(Arc::new(Fixed("fixed", "http://ex/a")))
            .declare(StrategyDeclaration::new("fixed", "content", ["article"]))
            .expect("declare");
        assert_eq!(dispatcher.generate(&entity).expect("id").as_str(), "http://ex/a");

        let dispatcher = dispatcher.with_strategy(Arc::new(Fixed("fixed", "http://ex/b")));
        assert_eq!(dispatcher.generate(&entity).expect("id").as_str(), "http://ex/b");
    }
}
