//! # Graph Resolver
//!
//! Owns the graph configuration and one `RequestGraphContext` per entity
//! type.
//!
//! Write target priority:
//! 1. An explicit target requested on the entity (must be enabled)
//! 2. The graph the entity was loaded from, if still enabled
//! 3. The configured default graph, if enabled
//! 4. The first enabled graph

use super::{GraphConfig, GraphDefinition, GraphSet, RequestGraphContext, SparqlEntity};
use crate::{Bundle, EntityId, EntityTypeId, GraphId, Iri, MappingError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

/// Resolves read and write graphs for entities.
#[derive(Debug)]
pub struct GraphResolver {
    config: GraphConfig,
    contexts: RwLock<BTreeMap<EntityTypeId, Arc<RequestGraphContext>>>,
}

impl GraphResolver {
    /// Create a resolver after validating the configuration.
    pub fn new(config: GraphConfig) -> Result<Self, MappingError> {
        validate(&config)?;
        Ok(Self {
            config,
            contexts: RwLock::new(BTreeMap::new()),
        })
    }

    /// Create a resolver, letting the host alter the configuration first.
    ///
    /// The hook runs exactly once; the configuration is immutable afterwards.
    pub fn with_alter<F>(mut config: GraphConfig, alter: F) -> Result<Self, MappingError>
    where
        F: FnOnce(&mut GraphConfig),
    {
        alter(&mut config);
        Self::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // =========================================================================
    // ENABLED GRAPHS
    // =========================================================================

    /// Definitions enabled for an entity type, ordered by weight then id.
    #[must_use]
    pub fn enabled_definitions(&self, entity_type: &EntityTypeId) -> Vec<&GraphDefinition> {
        let mut enabled: Vec<&GraphDefinition> = self
            .config
            .definitions
            .iter()
            .filter(|d| d.is_enabled_for(entity_type))
            .collect();
        enabled.sort_by(|a, b| a.weight.cmp(&b.weight).then_with(|| a.id.cmp(&b.id)));
        enabled
    }

    /// Ids of the graphs enabled for an entity type, ordered by weight then id.
    #[must_use]
    pub fn enabled_graphs(&self, entity_type: &EntityTypeId) -> GraphSet {
        GraphSet::from_ids(
            self.enabled_definitions(entity_type)
                .into_iter()
                .map(|d| d.id.clone()),
        )
    }

    // =========================================================================
    // REQUEST GRAPHS
    // =========================================================================

    /// The request context of an entity type, created on first use.
    pub fn request_context(&self, entity_type: &EntityTypeId) -> Arc<RequestGraphContext> {
        if let Some(context) = self
            .contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_type)
        {
            return Arc::clone(context);
        }

        let enabled = self.enabled_graphs(entity_type);
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            contexts
                .entry(entity_type.clone())
                .or_insert_with(|| Arc::new(RequestGraphContext::new(entity_type.clone(), enabled))),
        )
    }

    /// The graphs a read of `entity_id` consults.
    pub fn request_graphs(&self, entity_type: &EntityTypeId, entity_id: &EntityId) -> GraphSet {
        self.request_context(entity_type).get(entity_id)
    }

    /// Narrow the graphs a read of `entity_id` consults.
    pub fn set_request_graphs<S: AsRef<str>>(
        &self,
        entity_type: &EntityTypeId,
        entity_id: &EntityId,
        names: &[S],
    ) -> Result<GraphSet, MappingError> {
        self.request_context(entity_type).set(entity_id, names)
    }

    /// Reset the given entities, or every entity of the type if `entity_ids`
    /// is empty.
    pub fn reset_request_graphs(&self, entity_type: &EntityTypeId, entity_ids: &[EntityId]) {
        self.request_context(entity_type).reset(entity_ids);
    }

    /// Reset every entity of every entity type. Meant for batch boundaries.
    pub fn reset_all_request_graphs(&self) {
        let contexts = self.contexts.read().unwrap_or_else(PoisonError::into_inner);
        for context in contexts.values() {
            context.reset(&[]);
        }
    }

    // =========================================================================
    // TARGET GRAPH
    // =========================================================================

    /// The single graph a save of `entity` writes to.
    ///
    /// Fails with `UnknownGraph` only when an explicit target is requested
    /// that is not enabled for the entity type.
    pub fn target_graph_from_entity(
        &self,
        entity: &dyn SparqlEntity,
    ) -> Result<GraphId, MappingError> {
        let entity_type = entity.entity_type_id();
        let enabled = self.enabled_graphs(entity_type);

        if let Some(target) = entity.target_graph() {
            if !enabled.contains(target.as_str()) {
                return Err(MappingError::UnknownGraph {
                    entity_type: entity_type.clone(),
                    graph: target.clone(),
                });
            }
            return Ok(target.clone());
        }

        if let Some(recorded) = entity.graph().filter(|g| enabled.contains(g.as_str())) {
            return Ok(recorded.clone());
        }

        if enabled.contains(self.config.default_graph.as_str()) {
            return Ok(self.config.default_graph.clone());
        }

        // The default graph is validated as enabled and unrestricted, so the
        // set is never empty here.
        enabled
            .first()
            .cloned()
            .ok_or_else(|| MappingError::UnknownGraph {
                entity_type: entity_type.clone(),
                graph: self.config.default_graph.clone(),
            })
    }

    // =========================================================================
    // GRAPH URIS
    // =========================================================================

    /// The concrete URI of a (bundle, graph) pair.
    pub fn bundle_graph_uri(
        &self,
        entity_type: &EntityTypeId,
        bundle: &str,
        graph: &str,
    ) -> Result<Iri, MappingError> {
        if self.config.definition(graph).is_none() {
            return Err(MappingError::UnknownGraph {
                entity_type: entity_type.clone(),
                graph: GraphId::from(graph),
            });
        }
        self.config
            .bindings
            .get(entity_type)
            .and_then(|bundles| bundles.get(bundle))
            .and_then(|graphs| graphs.get(graph))
            .cloned()
            .ok_or_else(|| MappingError::GraphUriNotConfigured {
                entity_type: entity_type.clone(),
                bundle: Bundle::from(bundle),
                graph: GraphId::from(graph),
            })
    }

    /// bundle -> graph -> URI for every bound pair of an enabled graph,
    /// optionally limited to some graph ids.
    #[must_use]
    pub fn entity_type_graph_uris(
        &self,
        entity_type: &EntityTypeId,
        limit_to: Option<&[GraphId]>,
    ) -> BTreeMap<Bundle, BTreeMap<GraphId, Iri>> {
        let enabled = self.enabled_graphs(entity_type);
        let Some(bundles) = self.config.bindings.get(entity_type) else {
            return BTreeMap::new();
        };

        bundles
            .iter()
            .map(|(bundle, graphs)| {
                let graphs = graphs
                    .iter()
                    .filter(|(id, _)| enabled.contains(id.as_str()))
                    .filter(|(id, _)| limit_to.is_none_or(|limit| limit.contains(*id)))
                    .map(|(id, uri)| (id.clone(), uri.clone()))
                    .collect::<BTreeMap<_, _>>();
                (bundle.clone(), graphs)
            })
            .filter(|(_, graphs)| !graphs.is_empty())
            .collect()
    }

    /// The (bundle, graph) pair bound to a graph URI, if any.
    #[must_use]
    pub fn graph_id_from_uri(
        &self,
        entity_type: &EntityTypeId,
        uri: &str,
    ) -> Option<(Bundle, GraphId)> {
        self.config
            .bindings
            .get(entity_type)?
            .iter()
            .find_map(|(bundle, graphs)| {
                graphs
                    .iter()
                    .find(|(_, bound)| bound.as_str() == uri)
                    .map(|(graph, _)| (bundle.clone(), graph.clone()))
            })
    }

    /// URIs of the graphs a read of `entity_id` (of `bundle`) consults, in
    /// request order.
    pub fn request_graph_uris(
        &self,
        entity_type: &EntityTypeId,
        entity_id: &EntityId,
        bundle: &str,
    ) -> Result<Vec<Iri>, MappingError> {
        self.request_graphs(entity_type, entity_id)
            .iter()
            .map(|graph| self.bundle_graph_uri(entity_type, bundle, graph.as_str()))
            .collect()
    }
}

/// Check that the default graph exists, is enabled for every entity type, and
/// that ids and bindings are consistent.
fn validate(config: &GraphConfig) -> Result<(), MappingError> {
    let mut ids = BTreeSet::new();
    for definition in &config.definitions {
        if definition.id.as_str().is_empty() {
            return Err(MappingError::InvalidConfig(
                "graph id must not be empty".to_string(),
            ));
        }
        if !ids.insert(&definition.id) {
            return Err(MappingError::InvalidConfig(format!(
                "duplicate graph definition: {}",
                definition.id
            )));
        }
    }

    let Some(default) = config.definition(config.default_graph.as_str()) else {
        return Err(MappingError::InvalidConfig(format!(
            "default graph {} is not defined",
            config.default_graph
        )));
    };
    if !default.enabled || default.entity_types.is_some() {
        return Err(MappingError::InvalidConfig(format!(
            "default graph {} must be enabled for every entity type",
            config.default_graph
        )));
    }

    for (entity_type, bundles) in &config.bindings {
        for (bundle, graphs) in bundles {
            if let Some(graph) = graphs.keys().find(|g| !ids.contains(g)) {
                return Err(MappingError::InvalidConfig(format!(
                    "bundle {} of entity type {} binds undefined graph {}",
                    bundle, entity_type, graph
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityStub;

    fn config() -> GraphConfig {
        GraphConfig::default()
            .with_graph(GraphDefinition::new("draft", "Draft", 10))
            .with_graph(GraphDefinition::new("archive", "Archive", 20).disabled())
            .with_binding("content", "article", "default", "http://ex/g/article")
            .with_binding("content", "article", "draft", "http://ex/g/article-draft")
            .with_binding("content", "page", "default", "http://ex/g/page")
    }

    fn resolver() -> GraphResolver {
        GraphResolver::new(config()).expect("resolver")
    }

    fn content() -> EntityTypeId {
        EntityTypeId::from("content")
    }

    #[test]
    fn enabled_graphs_sorted_by_weight_excluding_disabled() {
        let resolver = GraphResolver::new(
            config().with_graph(GraphDefinition::new("review", "Review", -5)),
        )
        .expect("resolver");
        assert_eq!(
            resolver.enabled_graphs(&content()).names(),
            vec!["review", "default", "draft"]
        );
    }

    #[test]
    fn restricted_graph_hidden_from_other_types() {
        let resolver = GraphResolver::new(
            GraphConfig::default()
                .with_graph(GraphDefinition::new("draft", "Draft", 10).restricted_to(["content"])),
        )
        .expect("resolver");
        assert_eq!(resolver.enabled_graphs(&content()).len(), 2);
        assert_eq!(
            resolver.enabled_graphs(&EntityTypeId::from("user")).names(),
            vec!["default"]
        );
    }

    #[test]
    fn default_graph_cannot_be_disabled() {
        let result = GraphResolver::with_alter(config(), |c| {
            c.upsert_graph(GraphDefinition::new("default", "Default", 0).disabled());
        });
        assert!(matches!(result, Err(MappingError::InvalidConfig(_))));
    }

    #[test]
    fn binding_to_undefined_graph_rejected() {
        let result = GraphResolver::new(config().with_binding("content", "article", "nope", "http://ex/g"));
        assert!(matches!(result, Err(MappingError::InvalidConfig(_))));
    }

    #[test]
    fn alter_hook_extends_definitions() {
        let resolver = GraphResolver::with_alter(config(), |c| {
            c.upsert_graph(GraphDefinition::new("staging", "Staging", 15));
        })
        .expect("resolver");
        assert!(resolver.enabled_graphs(&content()).contains("staging"));
    }

    #[test]
    fn target_priority_default_then_override() {
        let resolver = resolver();
        let entity = EntityStub::new("content", "article").with_id("http://ex/e1");
        assert_eq!(
            resolver.target_graph_from_entity(&entity).expect("target").as_str(),
            "default"
        );

        let entity = entity.with_graph("draft");
        assert_eq!(
            resolver.target_graph_from_entity(&entity).expect("target").as_str(),
            "draft"
        );

        let entity = entity.with_target_graph("default");
        assert_eq!(
            resolver.target_graph_from_entity(&entity).expect("target").as_str(),
            "default"
        );
    }

    #[test]
    fn recorded_disabled_graph_falls_through() {
        let entity = EntityStub::new("content", "article").with_graph("archive");
        assert_eq!(
            resolver().target_graph_from_entity(&entity).expect("target").as_str(),
            "default"
        );
    }

    #[test]
    fn explicit_disabled_target_rejected() {
        let entity = EntityStub::new("content", "article").with_target_graph("archive");
        assert!(matches!(
            resolver().target_graph_from_entity(&entity),
            Err(MappingError::UnknownGraph { .. })
        ));
    }

    #[test]
    fn bundle_graph_uri_lookup() {
        let resolver = resolver();
        assert_eq!(
            resolver
                .bundle_graph_uri(&content(), "article", "draft")
                .expect("uri")
                .as_str(),
            "http://ex/g/article-draft"
        );
        assert!(matches!(
            resolver.bundle_graph_uri(&content(), "page", "draft"),
            Err(MappingError::GraphUriNotConfigured { .. })
        ));
        assert!(matches!(
            resolver.bundle_graph_uri(&content(), "page", "nope"),
            Err(MappingError::UnknownGraph { .. })
        ));
    }

    #[test]
    fn graph_uris_and_reverse_lookup() {
        let resolver = resolver();
        let all = resolver.entity_type_graph_uris(&content(), None);
        assert_eq!(all.len(), 2);
        assert_eq!(all["article"].len(), 2);

        let limit = [GraphId::from("draft")];
        let drafts = resolver.entity_type_graph_uris(&content(), Some(&limit));
        assert_eq!(drafts.len(), 1);
        assert!(drafts["article"].contains_key("draft"));

        assert_eq!(
            resolver.graph_id_from_uri(&content(), "http://ex/g/page"),
            Some((Bundle::from("page"), GraphId::from("default")))
        );
        assert_eq!(resolver.graph_id_from_uri(&content(), "http://ex/other"), None);
    }

    #[test]
    fn request_graph_uris_follow_request_order() {
        let resolver = resolver();
        let e1 = EntityId::from("http://ex/e1");
        resolver
            .set_request_graphs(&content(), &e1, &["draft", "default"])
            .expect("set");
        let uris = resolver
            .request_graph_uris(&content(), &e1, "article")
            .expect("uris");
        assert_eq!(
            uris,
            vec![
                Iri::from("http://ex/g/article-draft"),
                Iri::from("http://ex/g/article")
            ]
        );
        assert!(resolver.request_graph_uris(&content(), &e1, "page").is_err());
    }

    #[test]
    fn reset_all_clears_every_type() {
        let resolver = resolver();
        let e1 = EntityId::from("e1");
        let u1 = EntityId::from("u1");
        let user = EntityTypeId::from("user");
        resolver.set_request_graphs(&content(), &e1, &["draft"]).expect("set");
        resolver.set_request_graphs(&user, &u1, &["default"]).expect("set");

        resolver.reset_all_request_graphs();
        assert!(!resolver.request_context(&content()).is_active(&e1));
        assert!(!resolver.request_context(&user).is_active(&u1));
    }
}
