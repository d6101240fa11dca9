//! # Request Graph Context
//!
//! Per-entity record of which graphs the current operation reads from.
//!
//! Each entity id is either **unset** (no entry) or **active** (an entry with
//! a non-empty `GraphSet`). Reading an unset id memoizes the entity type's
//! enabled graphs. Entries of different ids never affect each other; only a
//! global reset touches all of them at once.

use super::GraphSet;
use crate::primitives::MAX_REQUEST_GRAPHS;
use crate::{EntityId, EntityTypeId, GraphId, MappingError};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Request graph overrides of one entity type.
#[derive(Debug)]
pub struct RequestGraphContext {
    entity_type: EntityTypeId,
    enabled: GraphSet,
    active: RwLock<BTreeMap<EntityId, GraphSet>>,
}

impl RequestGraphContext {
    /// Create a context whose default is `enabled`.
    pub fn new(entity_type: EntityTypeId, enabled: GraphSet) -> Self {
        Self {
            entity_type,
            enabled,
            active: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.entity_type
    }

    /// The enabled graphs, which unset entities default to.
    #[must_use]
    pub fn enabled(&self) -> &GraphSet {
        &self.enabled
    }

    /// The active graphs of an entity, memoizing the default if unset.
    ///
    /// Every id ever read keeps an entry until it is reset, so the table grows
    /// with the number of distinct entities a long-lived context sees. Callers
    /// that touch many entities should read inside [`Self::scoped`] or call
    /// [`Self::reset`] when an operation finishes.
    pub fn get(&self, entity_id: &EntityId) -> GraphSet {
        if let Some(set) = self
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
        {
            return set.clone();
        }

        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(entity_id.clone())
            .or_insert_with(|| self.enabled.clone())
            .clone()
    }

    /// Narrow the active graphs of an entity.
    ///
    /// Every name must be an enabled graph of the entity type. Duplicates are
    /// dropped, keeping the first occurrence. On error the previous state is
    /// left untouched.
    pub fn set<S: AsRef<str>>(
        &self,
        entity_id: &EntityId,
        names: &[S],
    ) -> Result<GraphSet, MappingError> {
        let set = self.validate(entity_id, names)?;
        self.replace(entity_id, set.clone());
        Ok(set)
    }

    fn validate<S: AsRef<str>>(
        &self,
        entity_id: &EntityId,
        names: &[S],
    ) -> Result<GraphSet, MappingError> {
        if names.len() > MAX_REQUEST_GRAPHS {
            return Err(MappingError::TooManyGraphs {
                entity_type: self.entity_type.clone(),
                count: names.len(),
                max: MAX_REQUEST_GRAPHS,
            });
        }
        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !self.enabled.contains(name))
        {
            return Err(MappingError::UnknownGraph {
                entity_type: self.entity_type.clone(),
                graph: GraphId::from(unknown),
            });
        }

        let set = GraphSet::from_ids(names.iter().map(AsRef::as_ref));
        if set.is_empty() {
            return Err(MappingError::EmptyGraphSet {
                entity_type: self.entity_type.clone(),
                entity_id: entity_id.clone(),
            });
        }
        Ok(set)
    }

    /// Store `set` for the entity, returning the entry it replaced.
    fn replace(&self, entity_id: &EntityId, set: GraphSet) -> Option<GraphSet> {
        tracing::trace!(
            entity_type = %self.entity_type,
            entity_id = %entity_id,
            graphs = ?set.names(),
            "request graphs set"
        );
        self.active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_id.clone(), set)
    }

    /// Return entities to unset. An empty list resets every entity.
    pub fn reset(&self, entity_ids: &[EntityId]) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if entity_ids.is_empty() {
            let cleared = active.len();
            active.clear();
            tracing::debug!(entity_type = %self.entity_type, cleared, "request graphs reset");
        } else {
            for id in entity_ids {
                active.remove(id);
            }
        }
    }

    /// Whether the entity has an entry (default or override).
    #[must_use]
    pub fn is_active(&self, entity_id: &EntityId) -> bool {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(entity_id)
    }

    /// Number of entities with an entry.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Set request graphs for the lifetime of the returned guard.
    ///
    /// Dropping the guard puts back the entry the scope replaced: an entity
    /// that was unset becomes unset again, an override is restored. Scopes
    /// of one entity nest; overlapping them out of order is not supported.
    pub fn scoped<S: AsRef<str>>(
        self: &Arc<Self>,
        entity_id: &EntityId,
        names: &[S],
    ) -> Result<RequestGraphGuard, MappingError> {
        let graphs = self.validate(entity_id, names)?;
        let previous = self.replace(entity_id, graphs.clone());
        Ok(RequestGraphGuard {
            context: Arc::clone(self),
            entity_id: entity_id.clone(),
            graphs,
            previous,
        })
    }

    fn restore(&self, entity_id: &EntityId, previous: Option<GraphSet>) {
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        match previous {
            Some(set) => {
                active.insert(entity_id.clone(), set);
            }
            None => {
                active.remove(entity_id);
            }
        }
    }
}

/// Restores one entity's request graphs when dropped.
#[derive(Debug)]
pub struct RequestGraphGuard {
    context: Arc<RequestGraphContext>,
    entity_id: EntityId,
    graphs: GraphSet,
    previous: Option<GraphSet>,
}

impl RequestGraphGuard {
    /// The graphs set by this guard.
    #[must_use]
    pub fn graphs(&self) -> &GraphSet {
        &self.graphs
    }
}

impl Drop for RequestGraphGuard {
    fn drop(&mut self) {
        self.context.restore(&self.entity_id, self.previous.take());
    }
}

// =============================================================================
// TESTS
// =============================================================================
