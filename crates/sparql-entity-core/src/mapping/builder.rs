//! # Mapping Builder
//!
//! Turns an `EntityTypeSchema` into an `EntityTypeMapping`.
//!
//! Every declaration error is raised here, at construction time, so that a
//! mapping that exists is always complete:
//! - every bundle has exactly one type URI
//! - every mapped column has a value format
//! - within one bundle a predicate holds exactly one (field, column)
//! - field predicates never collide with bundle predicates

use super::{ColumnMapping, EntityTypeMapping, OutboundMap};
use crate::primitives::RDF_TYPE;
use crate::schema::{EntityTypeSchema, FieldSchema};
use crate::{Bundle, ColumnName, EntityTypeId, FieldName, Iri, MappingError};
use std::collections::{BTreeMap, BTreeSet};

/// Stateless builder for entity type mappings.
pub struct MappingBuilder;

impl MappingBuilder {
    /// Build and validate the mapping of one entity type.
    pub fn build(schema: &EntityTypeSchema) -> Result<EntityTypeMapping, MappingError> {
        let entity_type = &schema.id;
        let invalid = |reason: String| MappingError::InvalidSchema {
            entity_type: entity_type.clone(),
            reason,
        };

        if schema.bundles.is_empty() {
            return Err(invalid("an entity type needs at least one bundle".to_string()));
        }

        let bundle_predicates = if schema.bundle_predicates.is_empty() {
            vec![Iri::from(RDF_TYPE)]
        } else {
            schema.bundle_predicates.clone()
        };

        let mut bundle_to_type = BTreeMap::new();
        let mut main_properties: BTreeMap<FieldName, ColumnName> = BTreeMap::new();
        let mut outbound = BTreeMap::new();

        for bundle in &schema.bundles {
            let type_uri = bundle
                .type_uri
                .clone()
                .ok_or_else(|| MappingError::UnmappedBundle {
                    entity_type: entity_type.clone(),
                    bundle: bundle.name.clone(),
                })?;
            if bundle_to_type
                .insert(bundle.name.clone(), type_uri)
                .is_some()
            {
                return Err(invalid(format!("bundle {} is declared twice", bundle.name)));
            }

            let mut seen_fields = BTreeSet::new();
            let mut claimed: BTreeMap<Iri, (FieldName, ColumnName)> = BTreeMap::new();
            let mut fields = BTreeMap::new();

            for field in schema.base_fields.iter().chain(&bundle.fields) {
                if !seen_fields.insert(&field.name) {
                    return Err(invalid(format!(
                        "field {} is declared twice for bundle {}",
                        field.name, bundle.name
                    )));
                }

                let columns = Self::map_field(entity_type, &bundle.name, field)?;
                if columns.is_empty() {
                    continue;
                }

                for (column, mapping) in &columns {
                    if bundle_predicates.contains(&mapping.predicate) {
                        return Err(invalid(format!(
                            "{}.{} reuses bundle predicate {}",
                            field.name, column, mapping.predicate
                        )));
                    }
                    if let Some((other_field, other_column)) =
                        claimed.insert(
                            mapping.predicate.clone(),
                            (field.name.clone(), column.clone()),
                        )
                    {
                        return Err(invalid(format!(
                            "predicate {} holds both {}.{} and {}.{} in bundle {}",
                            mapping.predicate,
                            other_field,
                            other_column,
                            field.name,
                            column,
                            bundle.name
                        )));
                    }
                }

                match main_properties.get(&field.name) {
                    Some(main) if *main != field.main_property => {
                        return Err(invalid(format!(
                            "field {} declares main properties {} and {}",
                            field.name, main, field.main_property
                        )));
                    }
                    Some(_) => {}
                    None => {
                        main_properties.insert(field.name.clone(), field.main_property.clone());
                    }
                }

                fields.insert(field.name.clone(), columns);
            }

            outbound.insert(bundle.name.clone(), fields);
        }

        let fingerprint = schema.fingerprint()?;
        tracing::debug!(
            entity_type = %entity_type,
            bundles = bundle_to_type.len(),
            fields = main_properties.len(),
            %fingerprint,
            "built entity type mapping"
        );

        Ok(EntityTypeMapping::assemble(
            entity_type.clone(),
            fingerprint,
            schema.bundle_key.clone(),
            bundle_predicates,
            bundle_to_type,
            main_properties,
            OutboundMap(outbound),
        ))
    }

    /// Map the columns of one field in one bundle.
    ///
    /// Columns without a predicate are skipped. A field with mapped columns
    /// must map its main property.
    fn map_field(
        entity_type: &EntityTypeId,
        bundle: &Bundle,
        field: &FieldSchema,
    ) -> Result<BTreeMap<ColumnName, ColumnMapping>, MappingError> {
        let invalid = |reason: String| MappingError::InvalidSchema {
            entity_type: entity_type.clone(),
            reason,
        };

        let mut columns = BTreeMap::new();
        for column in &field.columns {
            let Some(predicate) = &column.predicate else {
                continue;
            };
            let format = column
                .format
                .clone()
                .ok_or_else(|| MappingError::MissingFormat {
                    entity_type: entity_type.clone(),
                    bundle: bundle.clone(),
                    field: field.name.clone(),
                    column: column.name.clone(),
                })?;
            if column.serialize && !format.holds_text() {
                return Err(invalid(format!(
                    "{}.{} is serialized but stored as {}",
                    field.name, column.name, format
                )));
            }
            let mapping = ColumnMapping {
                predicate: predicate.clone(),
                format,
                serialize: column.serialize,
            };
            if columns.insert(column.name.clone(), mapping).is_some() {
                return Err(invalid(format!(
                    "column {}.{} is declared twice",
                    field.name, column.name
                )));
            }
        }

        if !columns.is_empty() && !columns.contains_key(&field.main_property) {
            return Err(invalid(format!(
                "main property {} of field {} has no predicate in bundle {}",
                field.main_property, field.name, bundle
            )));
        }

        Ok(columns)
    }
}

// =============================================================================
// TESTS
// =============================================================================
