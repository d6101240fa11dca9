//! # Schema Input
//!
//! Entity-type, bundle and field declarations, as supplied by the hosting
//! application. The engine only reads these: the mapping builder turns them
//! into indices once and caches the result.
//!
//! A schema is the single source of truth for:
//! - the type URI of every bundle
//! - the predicate, value format and serialization flag of every field column
//! - the concrete graph URIs bound to every (bundle, graph) pair

use crate::format::ValueFormat;
use crate::{Bundle, ColumnName, EntityTypeId, FieldName, GraphId, Iri, MappingError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

// =============================================================================
// DECLARATIONS
// =============================================================================

/// One column (sub-value) of a field and its storage declaration.
///
/// A column without a predicate is not stored in the triplestore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: ColumnName,
    #[serde(default)]
    pub predicate: Option<Iri>,
    #[serde(default)]
    pub format: Option<ValueFormat>,
    /// Store the value as a JSON document inside a literal.
    #[serde(default)]
    pub serialize: bool,
}

impl ColumnSchema {
    /// A mapped column.
    #[must_use]
    pub fn mapped(name: impl Into<ColumnName>, predicate: impl Into<Iri>, format: ValueFormat) -> Self {
        Self {
            name: name.into(),
            predicate: Some(predicate.into()),
            format: Some(format),
            serialize: false,
        }
    }

    /// Mark the column as serialized.
    #[must_use]
    pub fn serialized(mut self) -> Self {
        self.serialize = true;
        self
    }
}

/// A field and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: FieldName,
    /// The column used when a lookup does not name one.
    #[serde(default = "default_main_property")]
    pub main_property: ColumnName,
    pub columns: Vec<ColumnSchema>,
}

fn default_main_property() -> ColumnName {
    ColumnName::from("value")
}

impl FieldSchema {
    /// A field whose main property is `main_property`.
    #[must_use]
    pub fn new(name: impl Into<FieldName>, main_property: impl Into<ColumnName>) -> Self {
        Self {
            name: name.into(),
            main_property: main_property.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }
}

/// A bundle: its type URI, its extra fields and its graph bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleSchema {
    pub name: Bundle,
    #[serde(default)]
    pub type_uri: Option<Iri>,
    /// Bundle-specific fields, in addition to the entity type's base fields.
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    /// Graph id -> concrete graph URI for entities of this bundle.
    #[serde(default)]
    pub graphs: BTreeMap<GraphId, Iri>,
}

impl BundleSchema {
    #[must_use]
    pub fn new(name: impl Into<Bundle>, type_uri: impl Into<Iri>) -> Self {
        Self {
            name: name.into(),
            type_uri: Some(type_uri.into()),
            fields: Vec::new(),
            graphs: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn graph(mut self, graph: impl Into<GraphId>, uri: impl Into<Iri>) -> Self {
        self.graphs.insert(graph.into(), uri.into());
        self
    }
}

/// The full declaration of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeSchema {
    pub id: EntityTypeId,
    /// Name of the entity key holding the bundle (e.g. `type`).
    #[serde(default = "default_bundle_key")]
    pub bundle_key: String,
    /// Predicates that carry the bundle type URI. Defaults to `rdf:type`.
    #[serde(default)]
    pub bundle_predicates: Vec<Iri>,
    /// Fields shared by every bundle.
    #[serde(default)]
    pub base_fields: Vec<FieldSchema>,
    pub bundles: Vec<BundleSchema>,
}

fn default_bundle_key() -> String {
    "type".to_string()
}

impl EntityTypeSchema {
    #[must_use]
    pub fn new(id: impl Into<EntityTypeId>) -> Self {
        Self {
            id: id.into(),
            bundle_key: default_bundle_key(),
            bundle_predicates: Vec::new(),
            base_fields: Vec::new(),
            bundles: Vec::new(),
        }
    }

    #[must_use]
    pub fn base_field(mut self, field: FieldSchema) -> Self {
        self.base_fields.push(field);
        self
    }

    #[must_use]
    pub fn bundle(mut self, bundle: BundleSchema) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Compute the fingerprint of this declaration.
    ///
    /// Two schemas with the same fingerprint produce identical mappings.
    pub fn fingerprint(&self) -> Result<SchemaFingerprint, MappingError> {
        let bytes = postcard::to_stdvec(self)
            .map_err(|e| MappingError::SerializationError(e.to_string()))?;
        Ok(SchemaFingerprint(*blake3::hash(&bytes).as_bytes()))
    }
}

// =============================================================================
// FINGERPRINT
// =============================================================================

/// BLAKE3 digest of a serialized `EntityTypeSchema`.
///
/// Stored alongside built mappings so stale snapshots can be detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaFingerprint(pub [u8; 32]);

impl SchemaFingerprint {
    /// Lowercase hex representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// =============================================================================
// SCHEMA PROVIDER
// =============================================================================

/// Source of entity-type declarations.
///
/// Implemented by the hosting application. The registry calls it only when a
/// mapping is (re)built.
pub trait SchemaProvider: Send + Sync {
    /// The declaration of an entity type, if it exists.
    fn entity_type(&self, id: &EntityTypeId) -> Option<EntityTypeSchema>;

    /// Ids of every declared entity type, in deterministic order.
    fn entity_type_ids(&self) -> Vec<EntityTypeId>;
}

/// An in-memory schema provider.
///
/// Declarations can be replaced at runtime (e.g. when a bundle is installed);
/// callers must then invalidate the affected mapping in the registry.
#[derive(Debug, Default)]
pub struct StaticSchemaProvider {
    types: RwLock<BTreeMap<EntityTypeId, EntityTypeSchema>>,
}

impl StaticSchemaProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider from a list of declarations.
    #[must_use]
    pub fn from_schemas(schemas: impl IntoIterator<Item = EntityTypeSchema>) -> Self {
        let provider = Self::new();
        for schema in schemas {
            provider.upsert(schema);
        }
        provider
    }

    /// Insert or replace a declaration.
    pub fn upsert(&self, schema: EntityTypeSchema) {
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schema.id.clone(), schema);
    }

    /// Remove a declaration. Returns whether it existed.
    pub fn remove(&self, id: &EntityTypeId) -> bool {
        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn entity_type(&self, id: &EntityTypeId) -> Option<EntityTypeSchema> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn entity_type_ids(&self) -> Vec<EntityTypeId> {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
