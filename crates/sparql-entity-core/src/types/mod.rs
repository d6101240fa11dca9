//! # Core Type Definitions
//!
//! This module contains the identifier and error types shared by every part
//! of the engine:
//! - Schema identifiers (`EntityTypeId`, `Bundle`, `FieldName`, `ColumnName`)
//! - Triplestore identifiers (`Iri`, `GraphId`, `EntityId`)
//! - Error types (`MappingError`)
//!
//! ## Ordering Guarantees
//!
//! All identifiers are thin wrappers around `String` that implement `Ord` and
//! `Borrow<str>`, so they can key `BTreeMap`/`BTreeSet` indices and still be
//! looked up with a plain `&str`.

use crate::format::ValueFormat;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// STRING IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of an entity type (e.g. `content`), the top-level schema unit.
    EntityTypeId
);

string_id!(
    /// Name of a bundle, a sub-type of an entity type with its own field set.
    Bundle
);

string_id!(
    /// Name of a field of a bundle.
    FieldName
);

string_id!(
    /// Name of a column (sub-value) of a field, e.g. `value` or `target_id`.
    ColumnName
);

string_id!(
    /// An absolute IRI: a predicate, a bundle type URI, a graph URI or a datatype.
    Iri
);

string_id!(
    /// Name of a graph definition (e.g. `default`, `draft`).
    GraphId
);

string_id!(
    /// Identifier of a stored entity. In a triplestore this is the subject URI.
    EntityId
);

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the mapping and graph engine.
///
/// - No silent defaults: a missing mapping is always an error
/// - Every variant carries the entity type, bundle, field or graph involved
/// - The engine never logs these on the caller's behalf
#[derive(Debug, Error)]
pub enum MappingError {
    /// The schema provider does not know the entity type.
    #[error("Unknown entity type: {entity_type}")]
    UnknownEntityType { entity_type: EntityTypeId },

    /// A bundle has no declared type URI, or is not a bundle of the entity type.
    #[error("Bundle {bundle} of entity type {entity_type} has no type URI mapping")]
    UnmappedBundle {
        entity_type: EntityTypeId,
        bundle: Bundle,
    },

    /// A field has no predicate mapping at all.
    #[error("Field {field} of entity type {entity_type} has no predicate mapping")]
    UnmappedField {
        entity_type: EntityTypeId,
        field: FieldName,
    },

    /// A mapped column declares a predicate but no value format.
    #[error(
        "Column {field}.{column} of bundle {bundle} (entity type {entity_type}) declares a predicate without a value format"
    )]
    MissingFormat {
        entity_type: EntityTypeId,
        bundle: Bundle,
        field: FieldName,
        column: ColumnName,
    },

    /// A field column resolves to several formats and no bundle was given to pick one.
    #[error(
        "Field {field}.{column} of entity type {entity_type} has formats {formats:?} across bundles; a bundle is required"
    )]
    AmbiguousFormat {
        entity_type: EntityTypeId,
        field: FieldName,
        column: ColumnName,
        formats: Vec<ValueFormat>,
    },

    /// The schema is structurally invalid (duplicate fields, predicate collisions, ...).
    #[error("Invalid schema for entity type {entity_type}: {reason}")]
    InvalidSchema {
        entity_type: EntityTypeId,
        reason: String,
    },

    /// A graph name is not declared (or not enabled) for the entity type.
    #[error("Graph {graph} is not an enabled graph of entity type {entity_type}")]
    UnknownGraph {
        entity_type: EntityTypeId,
        graph: GraphId,
    },

    /// A request graph set would be empty.
    #[error("At least one graph must be active for entity {entity_id} of type {entity_type}")]
    EmptyGraphSet {
        entity_type: EntityTypeId,
        entity_id: EntityId,
    },

    /// More request graphs were supplied than any entity type can enable.
    #[error("{count} request graphs supplied for entity type {entity_type}, at most {max} allowed")]
    TooManyGraphs {
        entity_type: EntityTypeId,
        count: usize,
        max: usize,
    },

    /// No concrete graph URI is bound for the (bundle, graph) pair.
    #[error("No URI configured for graph {graph} of bundle {bundle} (entity type {entity_type})")]
    GraphUriNotConfigured {
        entity_type: EntityTypeId,
        bundle: Bundle,
        graph: GraphId,
    },

    /// A translatable literal was encoded without a language.
    #[error("Field {field} of entity type {entity_type} is translatable and requires a language")]
    MissingLanguage {
        entity_type: EntityTypeId,
        field: FieldName,
    },

    /// A value or term does not fit the declared value format.
    #[error("Value does not match format {expected}: {found}")]
    ValueFormatMismatch {
        expected: ValueFormat,
        found: String,
    },

    /// No identifier strategy, including the fallback, produced a usable id.
    #[error(
        "Identifier strategy {strategy} failed for bundle {bundle} of entity type {entity_type}: {reason}"
    )]
    IdentifierGeneration {
        entity_type: EntityTypeId,
        bundle: Bundle,
        strategy: String,
        reason: String,
    },

    /// The engine configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl MappingError {
    /// Build a `ValueFormatMismatch` from anything printable.
    pub(crate) fn mismatch(expected: &ValueFormat, found: impl fmt::Debug) -> Self {
        Self::ValueFormatMismatch {
            expected: expected.clone(),
            found: format!("{:?}", found),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn identifiers_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(Bundle::new("article"), 1);
        map.insert(Bundle::new("page"), 2);

        assert_eq!(map.get("page"), Some(&2));
        assert!(map.get("event").is_none());
    }

    #[test]
    fn identifiers_display_raw_string() {
        let iri = Iri::from("http://ex/title");
        assert_eq!(iri.to_string(), "http://ex/title");
        assert_eq!(iri.as_str(), "http://ex/title");
    }

    #[test]
    fn error_messages_carry_context() {
        let err = MappingError::GraphUriNotConfigured {
            entity_type: EntityTypeId::from("content"),
            bundle: Bundle::from("article"),
            graph: GraphId::from("draft"),
        };
        let msg = err.to_string();
        assert!(msg.contains("draft"));
        assert!(msg.contains("article"));
        assert!(msg.contains("content"));
    }
}
