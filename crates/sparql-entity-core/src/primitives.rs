//! # Engine Primitives
//!
//! Hardcoded constants for the mapping and graph engine.
//!
//! These values are compiled into the binary and are immutable at runtime:
//! vocabulary IRIs the codec emits, the blank-node convention, the name of the
//! mandatory graph, and the snapshot format header.

// =============================================================================
// VOCABULARY
// =============================================================================

/// `rdf:type`, the default predicate carrying a bundle's type URI.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Namespace of the XML Schema datatypes used by typed literals.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// Prefix that marks a reference value as a blank-node id rather than an IRI.
///
/// - `_:b0` encodes to the blank node `b0`
/// - Anything else encodes to a named node
pub const BLANK_NODE_PREFIX: &str = "_:";

// =============================================================================
// GRAPHS
// =============================================================================

/// Id of the graph that always exists and cannot be disabled.
pub const DEFAULT_GRAPH_ID: &str = "default";

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Magic bytes for the mapping snapshot header.
///
/// - Snapshot = Magic Bytes ("SPQM") + Version (u8) + Fingerprint (32 bytes)
///   before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"SPQM";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to `SerializableMapping`.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Maximum number of graphs accepted by a single `set_request_graphs` call.
pub const MAX_REQUEST_GRAPHS: usize = 64;

/// Maximum length of a language tag (BCP 47 tags are far shorter in practice).
pub const MAX_LANGUAGE_TAG_LENGTH: usize = 35;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xsd_constants_share_namespace() {
        for iri in [
            XSD_BOOLEAN,
            XSD_DATE,
            XSD_DATE_TIME,
            XSD_DECIMAL,
            XSD_INTEGER,
            XSD_STRING,
        ] {
            assert!(iri.starts_with(XSD_NS));
        }
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"SPQM");
    }
}
