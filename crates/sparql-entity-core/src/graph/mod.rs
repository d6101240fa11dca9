//! # Graph Module
//!
//! Named-graph resolution for entity reads and writes.
//!
//! Entities live in one or more named graphs (e.g. `default` for published
//! content and `draft` for working copies). This module decides:
//! - which graphs are enabled for an entity type (`GraphResolver::enabled_graphs`)
//! - which graphs a read of one entity consults (`RequestGraphContext`)
//! - which single graph a write commits to (`GraphResolver::target_graph_from_entity`)
//! - which concrete graph URI backs a (bundle, graph) pair
//!
//! Graph definitions and bundle bindings come from `GraphConfig`, optionally
//! altered once by the hosting application when the resolver is built.

mod context;
mod resolver;

pub use context::{RequestGraphContext, RequestGraphGuard};
pub use resolver::GraphResolver;

use crate::primitives::DEFAULT_GRAPH_ID;
use crate::{Bundle, EntityId, EntityTypeId, GraphId, Iri};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPH DEFINITIONS
// =============================================================================

fn enabled_default() -> bool {
    true
}

/// A declared named graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub id: GraphId,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Lower weights sort first.
    #[serde(default)]
    pub weight: i32,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Entity types the graph applies to. `None` means all of them.
    #[serde(default)]
    pub entity_types: Option<BTreeSet<EntityTypeId>>,
}

impl GraphDefinition {
    /// An enabled, unrestricted graph.
    pub fn new(id: impl Into<GraphId>, label: impl Into<String>, weight: i32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            weight,
            enabled: true,
            entity_types: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Restrict the graph to the given entity types.
    #[must_use]
    pub fn restricted_to<I, T>(mut self, entity_types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityTypeId>,
    {
        self.entity_types = Some(entity_types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether the graph is enabled for an entity type.
    #[must_use]
    pub fn is_enabled_for(&self, entity_type: &EntityTypeId) -> bool {
        self.enabled
            && self
                .entity_types
                .as_ref()
                .is_none_or(|types| types.contains(entity_type))
    }
}

/// Graph definitions plus per-bundle graph URI bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub default_graph: GraphId,
    pub definitions: Vec<GraphDefinition>,
    /// entity type -> bundle -> graph -> graph URI.
    #[serde(default)]
    pub bindings: BTreeMap<EntityTypeId, BTreeMap<Bundle, BTreeMap<GraphId, Iri>>>,
}

impl Default for GraphConfig {
    /// Only the mandatory `default` graph, with no bindings.
    fn default() -> Self {
        Self {
            default_graph: GraphId::from(DEFAULT_GRAPH_ID),
            definitions: vec![GraphDefinition::new(DEFAULT_GRAPH_ID, "Default", 0)],
            bindings: BTreeMap::new(),
        }
    }
}

impl GraphConfig {
    /// Add (or replace) a graph definition.
    #[must_use]
    pub fn with_graph(mut self, definition: GraphDefinition) -> Self {
        self.upsert_graph(definition);
        self
    }

    /// Bind a concrete URI to a (bundle, graph) pair.
    #[must_use]
    pub fn with_binding(
        mut self,
        entity_type: impl Into<EntityTypeId>,
        bundle: impl Into<Bundle>,
        graph: impl Into<GraphId>,
        uri: impl Into<Iri>,
    ) -> Self {
        self.bind(entity_type, bundle, graph, uri);
        self
    }

    /// Add a definition, replacing any with the same id.
    pub fn upsert_graph(&mut self, definition: GraphDefinition) {
        match self.definitions.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
    }

    pub fn bind(
        &mut self,
        entity_type: impl Into<EntityTypeId>,
        bundle: impl Into<Bundle>,
        graph: impl Into<GraphId>,
        uri: impl Into<Iri>,
    ) {
        self.bindings
            .entry(entity_type.into())
            .or_default()
            .entry(bundle.into())
            .or_default()
            .insert(graph.into(), uri.into());
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&GraphDefinition> {
        self.definitions.iter().find(|d| d.id.as_str() == id)
    }
}

// =============================================================================
// GRAPH SETS
// =============================================================================

/// An ordered, duplicate-free list of graph ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphSet(Vec<GraphId>);

impl GraphSet {
    /// Build a set keeping the first occurrence of each id.
    pub fn from_ids<I, T>(ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<GraphId>,
    {
        let mut out: Vec<GraphId> = Vec::new();
        for id in ids {
            let id = id.into();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|g| g.as_str() == id)
    }

    #[must_use]
    pub fn first(&self) -> Option<&GraphId> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphId> {
        self.0.iter()
    }

    /// The graph ids as string slices, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(GraphId::as_str).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a GraphSet {
    type Item = &'a GraphId;
    type IntoIter = std::slice::Iter<'a, GraphId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// The view of an entity the graph resolver and identifier strategies need.
pub trait SparqlEntity {
    fn entity_type_id(&self) -> &EntityTypeId;

    fn bundle(&self) -> &Bundle;

    /// The subject URI, if the entity already has one.
    fn id(&self) -> Option<&EntityId>;

    /// The graph the entity was loaded from, if it was loaded.
    fn graph(&self) -> Option<&GraphId>;

    /// An explicit write target requested for the current save.
    fn target_graph(&self) -> Option<&GraphId> {
        None
    }

    /// A human-readable label, used by deterministic id strategies.
    fn label(&self) -> Option<&str> {
        None
    }
}

/// A plain entity value implementing `SparqlEntity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStub {
    pub entity_type: EntityTypeId,
    pub bundle: Bundle,
    pub id: Option<EntityId>,
    pub graph: Option<GraphId>,
    pub target_graph: Option<GraphId>,
    pub label: Option<String>,
}

impl EntityStub {
    pub fn new(entity_type: impl Into<EntityTypeId>, bundle: impl Into<Bundle>) -> Self {
        Self {
            entity_type: entity_type.into(),
            bundle: bundle.into(),
            id: None,
            graph: None,
            target_graph: None,
            label: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<EntityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Record the graph the entity was loaded from.
    #[must_use]
    pub fn with_graph(mut self, graph: impl Into<GraphId>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Request an explicit write target.
    #[must_use]
    pub fn with_target_graph(mut self, graph: impl Into<GraphId>) -> Self {
        self.target_graph = Some(graph.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl SparqlEntity for EntityStub {
    fn entity_type_id(&self) -> &EntityTypeId {
        &self.entity_type
    }

    fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    fn graph(&self) -> Option<&GraphId> {
        self.graph.as_ref()
    }

    fn target_graph(&self) -> Option<&GraphId> {
        self.target_graph.as_ref()
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

// =============================================================================
// TESTS
// =============================================================================
