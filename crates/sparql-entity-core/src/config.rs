//! # Engine Configuration
//!
//! A single TOML document declaring everything the engine needs:
//!
//! ```toml
//! default_graph = "default"
//! id_base_uri = "http://example.org/id"
//!
//! [[graphs]]
//! id = "draft"
//! label = "Draft"
//! weight = 10
//!
//! [[entity_types]]
//! id = "content"
//!
//! [[entity_types.base_fields]]
//! name = "title"
//! columns = [{ name = "value", predicate = "http://purl.org/dc/terms/title", format = "translatable-literal" }]
//!
//! [[entity_types.bundles]]
//! name = "article"
//! type_uri = "http://example.org/Article"
//! graphs = { default = "http://example.org/graph/article", draft = "http://example.org/graph/article-draft" }
//!
//! [[identifiers]]
//! strategy = "hashed"
//! entity_type = "content"
//! bundles = ["article"]
//! ```
//!
//! The default graph is added automatically when `graphs` does not define it.

use crate::graph::{GraphConfig, GraphDefinition};
use crate::identifier::{HashedStrategy, IdentifierDispatcher, StrategyDeclaration, UuidStrategy};
use crate::primitives::DEFAULT_GRAPH_ID;
use crate::schema::{EntityTypeSchema, StaticSchemaProvider};
use crate::{GraphId, MappingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Base of hashed identifiers when no `id_base_uri` is configured.
const DEFAULT_HASHED_BASE: &str = "urn:sparql-entity";

fn default_graph_id() -> GraphId {
    GraphId::from(DEFAULT_GRAPH_ID)
}

/// The full engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_graph_id")]
    pub default_graph: GraphId,
    /// Base URI of generated entity ids.
    #[serde(default)]
    pub id_base_uri: Option<String>,
    /// Optional redb file caching built mappings across runs.
    #[serde(default)]
    pub snapshot_cache: Option<PathBuf>,
    #[serde(default)]
    pub graphs: Vec<GraphDefinition>,
    #[serde(default)]
    pub entity_types: Vec<EntityTypeSchema>,
    #[serde(default)]
    pub identifiers: Vec<StrategyDeclaration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_graph: default_graph_id(),
            id_base_uri: None,
            snapshot_cache: None,
            graphs: Vec::new(),
            entity_types: Vec::new(),
            identifiers: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, MappingError> {
        let config: Self =
            toml::from_str(content).map_err(|e| MappingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| MappingError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Check identifiers are unique. Schema and graph consistency are checked
    /// by the mapping builder and the graph resolver.
    pub fn validate(&self) -> Result<(), MappingError> {
        let mut seen = BTreeSet::new();
        for schema in &self.entity_types {
            if schema.id.as_str().is_empty() {
                return Err(MappingError::InvalidConfig(
                    "entity type id must not be empty".to_string(),
                ));
            }
            if !seen.insert(&schema.id) {
                return Err(MappingError::InvalidConfig(format!(
                    "entity type {} declared twice",
                    schema.id
                )));
            }
        }
        if let Some(declaration) = self
            .identifiers
            .iter()
            .find(|d| !seen.contains(&d.entity_type))
        {
            return Err(MappingError::InvalidConfig(format!(
                "identifier strategy {} declared for unknown entity type {}",
                declaration.strategy, declaration.entity_type
            )));
        }
        Ok(())
    }

    /// Schema provider over the declared entity types.
    pub fn schema_provider(&self) -> Arc<StaticSchemaProvider> {
        Arc::new(StaticSchemaProvider::from_schemas(self.entity_types.iter().cloned()))
    }

    /// Graph definitions and the bundle bindings declared on each bundle.
    #[must_use]
    pub fn graph_config(&self) -> GraphConfig {
        let mut config = GraphConfig {
            default_graph: self.default_graph.clone(),
            definitions: Vec::new(),
            bindings: Default::default(),
        };
        if !self.graphs.iter().any(|g| g.id == self.default_graph) {
            config.upsert_graph(GraphDefinition::new(self.default_graph.clone(), "Default", 0));
        }
        for definition in &self.graphs {
            config.upsert_graph(definition.clone());
        }

        for schema in &self.entity_types {
            for bundle in &schema.bundles {
                for (graph, uri) in &bundle.graphs {
                    config.bind(schema.id.clone(), bundle.name.clone(), graph.clone(), uri.clone());
                }
            }
        }
        config
    }

    /// Dispatcher with the built-in strategies and the declared bindings.
    ///
    /// `uuid` is the fallback; `hashed` is available for declarations.
    pub fn identifier_dispatcher(&self) -> Result<IdentifierDispatcher, MappingError> {
        let base = self.id_base_uri.as_deref().unwrap_or_default();
        let hashed_base = if base.is_empty() { DEFAULT_HASHED_BASE } else { base };

        let mut dispatcher = IdentifierDispatcher::new(Arc::new(UuidStrategy::new(base)))
            .with_strategy(Arc::new(HashedStrategy::new(hashed_base)));
        for declaration in &self.identifiers {
            dispatcher = dispatcher.declare(declaration.clone())?;
        }
        Ok(dispatcher)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityTypeId;
    use crate::schema::SchemaProvider;

    const CONFIG: &str = r#"
        id_base_uri = "http://ex/id"

        [[graphs]]
        id = "draft"
        label = "Draft"
        weight = 10

        [[entity_types]]
        id = "content"

        [[entity_types.base_fields]]
        name = "title"
        columns = [{ name = "value", predicate = "http://ex/title", format = "translatable-literal" }]

        [[entity_types.bundles]]
        name = "article"
        type_uri = "http://ex/Article"
        graphs = { default = "http://ex/g/article", draft = "http://ex/g/article-draft" }

        [[entity_types.bundles]]
        name = "page"
        type_uri = "http://ex/Page"

        [[identifiers]]
        strategy = "hashed"
        entity_type = "content"
        bundles = ["article"]
    "#;

    #[test]
    fn parses_full_document() {
        let config = EngineConfig::from_toml_str(CONFIG).expect("parse");
        assert_eq!(config.default_graph.as_str(), "default");
        assert_eq!(config.entity_types.len(), 1);
        assert_eq!(config.entity_types[0].bundles.len(), 2);
        assert_eq!(config.identifiers[0].strategy, "hashed");
    }

    #[test]
    fn graph_config_adds_default_and_bindings() {
        let graphs = EngineConfig::from_toml_str(CONFIG)
            .expect("parse")
            .graph_config();
        assert!(graphs.definition("default").is_some());
        assert!(graphs.definition("draft").is_some());
        assert_eq!(graphs.bindings["content"]["article"].len(), 2);
        assert!(!graphs.bindings["content"].contains_key("page"));
    }

    #[test]
    fn provider_serves_declared_types() {
        let provider = EngineConfig::from_toml_str(CONFIG)
            .expect("parse")
            .schema_provider();
        assert_eq!(provider.entity_type_ids(), vec![EntityTypeId::from("content")]);
    }

    #[test]
    fn dispatcher_honours_declarations() {
        let dispatcher = EngineConfig::from_toml_str(CONFIG)
            .expect("parse")
            .identifier_dispatcher()
            .expect("dispatcher");
        assert_eq!(dispatcher.declarations().len(), 1);
        assert_eq!(dispatcher.fallback().id(), "uuid");
    }

    #[test]
    fn duplicate_entity_type_rejected() {
        let doc = format!("{}\n[[entity_types]]\nid = \"content\"\nbundles = []\n", CONFIG);
        assert!(matches!(
            EngineConfig::from_toml_str(&doc),
            Err(MappingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_format_rejected() {
        let doc = CONFIG.replace("translatable-literal", "xsd:float");
        assert!(matches!(
            EngineConfig::from_toml_str(&doc),
            Err(MappingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            EngineConfig::load(dir.path().join("missing.toml")),
            Err(MappingError::IoError(_))
        ));
    }
}
