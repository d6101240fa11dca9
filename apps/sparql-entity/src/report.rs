//! # Report Types
//!
//! Serializable command outputs. Every command builds one of these and
//! prints it either as pretty JSON (`--json-mode`) or as text.

use serde::{Deserialize, Serialize};
use sparql_entity_core::{
    EntityTypeId, EntityTypeMapping, GraphDefinition, GraphResolver, SchemaFingerprint, Term,
};
use std::collections::BTreeMap;

// =============================================================================
// MAPPING REPORT
// =============================================================================

/// One bundle and its type URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRow {
    pub bundle: String,
    pub type_uri: String,
}

/// One mapped (bundle, field, column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRow {
    pub bundle: String,
    pub field: String,
    pub column: String,
    pub predicate: String,
    pub format: String,
    pub serialized: bool,
}

/// Full outbound mapping of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingReport {
    pub entity_type: String,
    pub fingerprint: String,
    pub bundle_key: String,
    pub bundle_predicates: Vec<String>,
    pub bundles: Vec<BundleRow>,
    pub columns: Vec<ColumnRow>,
    /// Predicates held by more than one bundle, with those bundles.
    pub shared_predicates: BTreeMap<String, Vec<String>>,
}

impl From<&EntityTypeMapping> for MappingReport {
    fn from(mapping: &EntityTypeMapping) -> Self {
        let outbound = mapping.outbound();
        let inbound = mapping.inbound();

        let shared_predicates = inbound
            .predicates()
            .filter_map(|predicate| {
                let bundles = inbound.bundles_for(predicate.as_str())?;
                (bundles.len() > 1).then(|| {
                    (
                        predicate.to_string(),
                        bundles.keys().map(ToString::to_string).collect(),
                    )
                })
            })
            .collect();

        Self {
            entity_type: mapping.entity_type().to_string(),
            fingerprint: mapping.fingerprint().to_hex(),
            bundle_key: mapping.bundle_key().to_string(),
            bundle_predicates: mapping
                .bundle_predicates()
                .iter()
                .map(ToString::to_string)
                .collect(),
            bundles: mapping
                .bundle_type_uris()
                .iter()
                .map(|(bundle, uri)| BundleRow {
                    bundle: bundle.to_string(),
                    type_uri: uri.to_string(),
                })
                .collect(),
            columns: outbound
                .iter()
                .map(|(bundle, field, column, m)| ColumnRow {
                    bundle: bundle.to_string(),
                    field: field.to_string(),
                    column: column.to_string(),
                    predicate: m.predicate.to_string(),
                    format: m.format.to_string(),
                    serialized: m.serialize,
                })
                .collect(),
            shared_predicates,
        }
    }
}

// =============================================================================
// LOOKUP REPORTS
// =============================================================================

/// Result of a field lookup (predicates or formats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLookupReport {
    pub entity_type: String,
    pub field: String,
    pub column: Option<String>,
    pub bundle: Option<String>,
    pub values: Vec<String>,
}

/// Result of a bundle <-> type URI lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLookupReport {
    pub entity_type: String,
    pub type_uri: String,
    pub bundles: Vec<String>,
}

/// Result of an inbound predicate resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldForPredicateReport {
    pub entity_type: String,
    pub predicate: String,
    pub bundle: String,
    pub field: Option<String>,
    pub column: Option<String>,
}

// =============================================================================
// CODEC REPORT
// =============================================================================

/// An encoded term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeReport {
    pub format: String,
    /// N-Triples rendering of the term.
    pub term: String,
    pub kind: String,
    pub language: Option<String>,
}

impl EncodeReport {
    pub fn new(format: &str, term: &Term) -> Self {
        let kind = match term {
            Term::NamedNode(_) => "named-node",
            Term::BlankNode(_) => "blank-node",
            Term::PlainLiteral(_) => "plain-literal",
            Term::LangLiteral { .. } => "language-literal",
            Term::TypedLiteral { .. } => "typed-literal",
        };
        Self {
            format: format.to_string(),
            term: term.to_string(),
            kind: kind.to_string(),
            language: term.language().map(str::to_string),
        }
    }
}

// =============================================================================
// GRAPH REPORTS
// =============================================================================

/// An enabled graph of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRow {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub weight: i32,
}

impl From<&GraphDefinition> for GraphRow {
    fn from(definition: &GraphDefinition) -> Self {
        Self {
            id: definition.id.to_string(),
            label: definition.label.clone(),
            description: definition.description.clone(),
            weight: definition.weight,
        }
    }
}

/// Enabled graphs and bundle graph URIs of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphsReport {
    pub entity_type: String,
    pub default_graph: String,
    pub enabled: Vec<GraphRow>,
    /// bundle -> graph -> URI
    pub uris: BTreeMap<String, BTreeMap<String, String>>,
}

impl GraphsReport {
    pub fn new(resolver: &GraphResolver, entity_type: &EntityTypeId) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            default_graph: resolver.config().default_graph.to_string(),
            enabled: resolver
                .enabled_definitions(entity_type)
                .into_iter()
                .map(GraphRow::from)
                .collect(),
            uris: resolver
                .entity_type_graph_uris(entity_type, None)
                .into_iter()
                .map(|(bundle, graphs)| {
                    (
                        bundle.to_string(),
                        graphs
                            .into_iter()
                            .map(|(g, uri)| (g.to_string(), uri.to_string()))
                            .collect(),
                    )
                })
                .collect(),
        }
    }
}

/// The resolved write target of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGraphReport {
    pub entity_type: String,
    pub bundle: String,
    pub graph: String,
    /// Concrete graph URI, when the bundle binds one.
    pub uri: Option<String>,
}

// =============================================================================
// IDENTIFIER / CACHE / HASH REPORTS
// =============================================================================

/// A generated identifier and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdReport {
    pub entity_type: String,
    pub bundle: String,
    pub strategy: String,
    pub id: String,
}

/// Entry of the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub entity_type: String,
    pub fingerprint: Option<String>,
    /// Whether the snapshot matches the current configuration.
    pub fresh: bool,
}

/// Content of the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReport {
    pub path: String,
    pub entries: Vec<CacheEntry>,
}

/// Schema fingerprint of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashReport {
    pub entity_type: String,
    pub algorithm: String,
    pub fingerprint: String,
}

impl HashReport {
    pub fn new(entity_type: &str, fingerprint: SchemaFingerprint) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            algorithm: "blake3".to_string(),
            fingerprint: fingerprint.to_hex(),
        }
    }
}

/// Outcome of validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub config: String,
    pub entity_types: usize,
    pub graphs: Vec<String>,
    pub strategies: Vec<String>,
}
