//! # Field/Bundle Mapping
//!
//! The bidirectional index between an entity type's schema and triplestore
//! predicates.
//!
//! - **Outbound**: bundle -> field -> column -> `{predicate, format, serialize}`
//! - **Inbound**: predicate -> bundle -> `(field, column)`
//! - **Bundles**: bundle -> type URI, and type URI -> bundles
//!
//! One predicate may serve several (field, bundle) pairs, so every inbound
//! lookup is keyed by bundle. The mapping never picks a bundle on the caller's
//! behalf: a caller resolving "which field does predicate P hold" must already
//! know the entity's bundle.

mod builder;
mod registry;

pub use builder::MappingBuilder;
pub use registry::MappingRegistry;

use crate::format::ValueFormat;
use crate::schema::SchemaFingerprint;
use crate::{Bundle, ColumnName, EntityTypeId, FieldName, Iri, MappingError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// =============================================================================
// INDEX ENTRIES
// =============================================================================

/// Storage declaration of one (field, column, bundle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub predicate: Iri,
    pub format: ValueFormat,
    pub serialize: bool,
}

/// A (field, column) pair, the target of an inbound lookup.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub field: FieldName,
    pub column: ColumnName,
}

// =============================================================================
// OUTBOUND MAP
// =============================================================================

/// bundle -> field -> column -> declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMap(pub BTreeMap<Bundle, BTreeMap<FieldName, BTreeMap<ColumnName, ColumnMapping>>>);

impl OutboundMap {
    /// Fields of one bundle.
    #[must_use]
    pub fn bundle(&self, bundle: &str) -> Option<&BTreeMap<FieldName, BTreeMap<ColumnName, ColumnMapping>>> {
        self.0.get(bundle)
    }

    /// Declaration of one (bundle, field, column).
    #[must_use]
    pub fn column(&self, bundle: &str, field: &str, column: &str) -> Option<&ColumnMapping> {
        self.0.get(bundle)?.get(field)?.get(column)
    }

    /// Iterate `(bundle, field, column, declaration)` in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bundle, &FieldName, &ColumnName, &ColumnMapping)> {
        self.0.iter().flat_map(|(bundle, fields)| {
            fields.iter().flat_map(move |(field, columns)| {
                columns
                    .iter()
                    .map(move |(column, mapping)| (bundle, field, column, mapping))
            })
        })
    }
}

// =============================================================================
// INBOUND MAP
// =============================================================================

/// predicate -> bundle -> (field, column).
///
/// Within one bundle a predicate resolves to exactly one (field, column); the
/// builder rejects schemas where it would not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMap(pub BTreeMap<Iri, BTreeMap<Bundle, FieldRef>>);

impl InboundMap {
    /// Every bundle using `predicate`, with the field it holds there.
    #[must_use]
    pub fn bundles_for(&self, predicate: &str) -> Option<&BTreeMap<Bundle, FieldRef>> {
        self.0.get(predicate)
    }

    /// The field `predicate` holds for an entity of `bundle`.
    #[must_use]
    pub fn resolve(&self, predicate: &str, bundle: &str) -> Option<&FieldRef> {
        self.0.get(predicate)?.get(bundle)
    }

    /// All mapped predicates.
    pub fn predicates(&self) -> impl Iterator<Item = &Iri> {
        self.0.keys()
    }
}

// =============================================================================
// ENTITY TYPE MAPPING
// =============================================================================

/// The complete, immutable mapping of one entity type.
///
/// Built once by [`MappingBuilder`] and shared through `Arc` by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTypeMapping {
    entity_type: EntityTypeId,
    fingerprint: SchemaFingerprint,
    bundle_key: String,
    bundle_predicates: Vec<Iri>,
    bundle_to_type: BTreeMap<Bundle, Iri>,
    type_to_bundles: BTreeMap<Iri, BTreeSet<Bundle>>,
    main_properties: BTreeMap<FieldName, ColumnName>,
    outbound: Arc<OutboundMap>,
    inbound: Arc<InboundMap>,
}

impl EntityTypeMapping {
    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeId {
        &self.entity_type
    }

    /// Fingerprint of the schema this mapping was built from.
    #[must_use]
    pub fn fingerprint(&self) -> SchemaFingerprint {
        self.fingerprint
    }

    #[must_use]
    pub fn bundle_key(&self) -> &str {
        &self.bundle_key
    }

    /// Predicates carrying the bundle type URI.
    #[must_use]
    pub fn bundle_predicates(&self) -> &[Iri] {
        &self.bundle_predicates
    }

    #[must_use]
    pub fn outbound(&self) -> Arc<OutboundMap> {
        Arc::clone(&self.outbound)
    }

    #[must_use]
    pub fn inbound(&self) -> Arc<InboundMap> {
        Arc::clone(&self.inbound)
    }

    /// Bundles in deterministic order.
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundle_to_type.keys()
    }

    /// bundle -> type URI.
    #[must_use]
    pub fn bundle_type_uris(&self) -> &BTreeMap<Bundle, Iri> {
        &self.bundle_to_type
    }

    // =========================================================================
    // BUNDLE RESOLUTION
    // =========================================================================

    /// The type URI of a bundle.
    pub fn bundle_to_type_uri(&self, bundle: &str) -> Result<&Iri, MappingError> {
        self.bundle_to_type
            .get(bundle)
            .ok_or_else(|| MappingError::UnmappedBundle {
                entity_type: self.entity_type.clone(),
                bundle: Bundle::from(bundle),
            })
    }

    /// Every bundle declaring `uri` as its type URI. Empty for foreign URIs.
    #[must_use]
    pub fn type_uri_to_bundles(&self, uri: &str) -> BTreeSet<Bundle> {
        self.type_to_bundles.get(uri).cloned().unwrap_or_default()
    }

    fn check_bundle(&self, bundle: &str) -> Result<(), MappingError> {
        self.bundle_to_type_uri(bundle).map(|_| ())
    }

    // =========================================================================
    // FIELD LOOKUPS
    // =========================================================================

    /// The main property (default column) of a field.
    pub fn field_main_property(&self, field: &str) -> Result<&ColumnName, MappingError> {
        self.main_properties
            .get(field)
            .ok_or_else(|| self.unmapped_field(field))
    }

    /// Whether the field has any predicate in any bundle.
    #[must_use]
    pub fn is_field_mapped(&self, field: &str) -> bool {
        self.main_properties.contains_key(field)
    }

    /// Whether `(bundle, field, column)` has a predicate. `column` defaults to
    /// the field's main property.
    #[must_use]
    pub fn has_field_predicate(&self, bundle: &str, field: &str, column: Option<&str>) -> bool {
        let Some(main) = self.main_properties.get(field) else {
            return false;
        };
        let column = column.unwrap_or(main.as_str());
        self.outbound.column(bundle, field, column).is_some()
    }

    /// Mapped columns of a field, across all bundles.
    pub fn field_columns(&self, field: &str) -> Result<BTreeSet<ColumnName>, MappingError> {
        self.field_main_property(field)?;
        Ok(self
            .outbound
            .0
            .values()
            .filter_map(|fields| fields.get(field))
            .flat_map(|columns| columns.keys().cloned())
            .collect())
    }

    /// Declarations of `(field, column)` for the selected bundles.
    ///
    /// - `column = None` selects the main property
    /// - `bundle = None` selects every bundle
    fn column_mappings(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<Vec<(&Bundle, &ColumnMapping)>, MappingError> {
        let main = self.field_main_property(field)?;
        let column = column.unwrap_or(main.as_str());
        if let Some(bundle) = bundle {
            self.check_bundle(bundle)?;
        }

        Ok(self
            .outbound
            .0
            .iter()
            .filter(|(b, _)| bundle.is_none_or(|wanted| b.as_str() == wanted))
            .filter_map(|(b, fields)| fields.get(field)?.get(column).map(|m| (b, m)))
            .collect())
    }

    /// Predicates of a field column.
    ///
    /// Fails with `UnmappedField` only if the field has no mapping at all; a
    /// bundle/column filter that matches nothing yields an empty set.
    pub fn field_predicates(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<BTreeSet<Iri>, MappingError> {
        Ok(self
            .column_mappings(field, column, bundle)?
            .into_iter()
            .map(|(_, m)| m.predicate.clone())
            .collect())
    }

    /// Declared formats of a field column.
    pub fn field_formats(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<BTreeSet<ValueFormat>, MappingError> {
        Ok(self
            .column_mappings(field, column, bundle)?
            .into_iter()
            .map(|(_, m)| m.format.clone())
            .collect())
    }

    /// The single declaration that applies to a column.
    ///
    /// Without a bundle, all bundles must agree on format and serialization,
    /// otherwise `AmbiguousFormat` is returned.
    pub fn column_mapping(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<&ColumnMapping, MappingError> {
        let mappings = self.column_mappings(field, column, bundle)?;
        let mut iter = mappings.iter().map(|(_, m)| *m);
        let Some(first) = iter.next() else {
            return Err(self.unmapped_field(field));
        };
        if iter.any(|m| m.format != first.format || m.serialize != first.serialize) {
            let main = self.field_main_property(field)?;
            return Err(MappingError::AmbiguousFormat {
                entity_type: self.entity_type.clone(),
                field: FieldName::from(field),
                column: ColumnName::from(column.unwrap_or(main.as_str())),
                formats: mappings
                    .iter()
                    .map(|(_, m)| m.format.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect(),
            });
        }
        Ok(first)
    }

    /// Whether a column stores serialized values.
    pub fn is_field_serialized(
        &self,
        field: &str,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> Result<bool, MappingError> {
        self.column_mapping(field, column, bundle).map(|m| m.serialize)
    }

    /// The field a predicate holds for an entity of a known bundle.
    pub fn field_for_predicate(
        &self,
        predicate: &str,
        bundle: &str,
    ) -> Result<Option<&FieldRef>, MappingError> {
        self.check_bundle(bundle)?;
        Ok(self.inbound.resolve(predicate, bundle))
    }

    fn unmapped_field(&self, field: &str) -> MappingError {
        MappingError::UnmappedField {
            entity_type: self.entity_type.clone(),
            field: FieldName::from(field),
        }
    }
}

// =============================================================================
// SERIALIZABLE MAPPING
// =============================================================================

/// Serializable form of `EntityTypeMapping` used by the snapshot format.
///
/// The inbound index and the reverse bundle index are derived on load, so a
/// snapshot cannot carry indices that disagree with its outbound map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableMapping {
    pub entity_type: EntityTypeId,
    pub fingerprint: SchemaFingerprint,
    pub bundle_key: String,
    pub bundle_predicates: Vec<Iri>,
    pub bundle_to_type: BTreeMap<Bundle, Iri>,
    pub main_properties: BTreeMap<FieldName, ColumnName>,
    pub outbound: OutboundMap,
}

impl From<&EntityTypeMapping> for SerializableMapping {
    fn from(mapping: &EntityTypeMapping) -> Self {
        Self {
            entity_type: mapping.entity_type.clone(),
            fingerprint: mapping.fingerprint,
            bundle_key: mapping.bundle_key.clone(),
            bundle_predicates: mapping.bundle_predicates.clone(),
            bundle_to_type: mapping.bundle_to_type.clone(),
            main_properties: mapping.main_properties.clone(),
            outbound: (*mapping.outbound).clone(),
        }
    }
}

impl From<SerializableMapping> for EntityTypeMapping {
    fn from(s: SerializableMapping) -> Self {
        EntityTypeMapping::assemble(
            s.entity_type,
            s.fingerprint,
            s.bundle_key,
            s.bundle_predicates,
            s.bundle_to_type,
            s.main_properties,
            s.outbound,
        )
    }
}

impl EntityTypeMapping {
    /// Derive the reverse indices and freeze the mapping.
    fn assemble(
        entity_type: EntityTypeId,
        fingerprint: SchemaFingerprint,
        bundle_key: String,
        bundle_predicates: Vec<Iri>,
        bundle_to_type: BTreeMap<Bundle, Iri>,
        main_properties: BTreeMap<FieldName, ColumnName>,
        outbound: OutboundMap,
    ) -> Self {
        let mut type_to_bundles: BTreeMap<Iri, BTreeSet<Bundle>> = BTreeMap::new();
        for (bundle, uri) in &bundle_to_type {
            type_to_bundles
                .entry(uri.clone())
                .or_default()
                .insert(bundle.clone());
        }

        let mut inbound: BTreeMap<Iri, BTreeMap<Bundle, FieldRef>> = BTreeMap::new();
        for (bundle, field, column, mapping) in outbound.iter() {
            inbound.entry(mapping.predicate.clone()).or_default().insert(
                bundle.clone(),
                FieldRef {
                    field: field.clone(),
                    column: column.clone(),
                },
            );
        }

        Self {
            entity_type,
            fingerprint,
            bundle_key,
            bundle_predicates,
            bundle_to_type,
            type_to_bundles,
            main_properties,
            outbound: Arc::new(outbound),
            inbound: Arc::new(InboundMap(inbound)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
