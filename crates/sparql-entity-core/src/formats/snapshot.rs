//! # Mapping Snapshot Format
//!
//! Binary serialization for built entity type mappings.
//!
//! Format: Header (37 bytes) + postcard-serialized `SerializableMapping`.
//! - 4 bytes: Magic ("SPQM")
//! - 1 byte: Version
//! - 32 bytes: Schema fingerprint of the mapping
//!
//! The fingerprint sits in the header so staleness can be decided without
//! decoding the payload. On load the payload must agree with the header and
//! with the entity type the caller asked for.

use crate::mapping::{EntityTypeMapping, SerializableMapping};
use crate::schema::SchemaFingerprint;
use crate::{EntityTypeId, MappingError, primitives};

/// Maximum allowed snapshot size.
///
/// A mapping holds one entry per (bundle, field, column); 16 MB is far above
/// any real schema and bounds allocation on corrupted input.
pub const MAX_SNAPSHOT_SIZE: usize = 16 * 1024 * 1024;

const MAGIC_END: usize = 4;
const FINGERPRINT_START: usize = MAGIC_END + 1;
/// Header length in bytes.
const HEADER_SIZE: usize = FINGERPRINT_START + 32;

fn corrupted(reason: impl Into<String>) -> MappingError {
    MappingError::SerializationError(reason.into())
}

/// Check size, magic and version, then return the header fingerprint.
fn read_header(bytes: &[u8]) -> Result<SchemaFingerprint, MappingError> {
    if bytes.len() < HEADER_SIZE {
        return Err(corrupted(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(corrupted(format!(
            "Snapshot size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }
    if &bytes[..MAGIC_END] != primitives::MAGIC_BYTES {
        return Err(corrupted("Invalid magic bytes"));
    }
    let version = bytes[MAGIC_END];
    if version != primitives::FORMAT_VERSION {
        return Err(corrupted(format!(
            "Unsupported snapshot version: {} (expected {})",
            version,
            primitives::FORMAT_VERSION
        )));
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&bytes[FINGERPRINT_START..HEADER_SIZE]);
    Ok(SchemaFingerprint(digest))
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a mapping to bytes (header + payload).
pub fn mapping_to_bytes(mapping: &EntityTypeMapping) -> Result<Vec<u8>, MappingError> {
    let payload = postcard::to_stdvec(&SerializableMapping::from(mapping))
        .map_err(|e| MappingError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(primitives::MAGIC_BYTES);
    result.push(primitives::FORMAT_VERSION);
    result.extend_from_slice(&mapping.fingerprint().0);
    result.extend_from_slice(&payload);
    Ok(result)
}

/// The schema fingerprint a snapshot was built from, read from the header
/// only.
pub fn snapshot_fingerprint(bytes: &[u8]) -> Result<SchemaFingerprint, MappingError> {
    read_header(bytes)
}

/// Deserialize the mapping of `entity_type` from bytes.
///
/// Fails if the snapshot belongs to another entity type or its payload
/// disagrees with the header fingerprint. Reverse indices are rebuilt from
/// the outbound map on load.
pub fn mapping_from_bytes(
    bytes: &[u8],
    entity_type: &EntityTypeId,
) -> Result<EntityTypeMapping, MappingError> {
    let fingerprint = read_header(bytes)?;

    let serializable: SerializableMapping = postcard::from_bytes(&bytes[HEADER_SIZE..])
        .map_err(|e| corrupted(format!("Failed to deserialize mapping: {}", e)))?;
    if &serializable.entity_type != entity_type {
        return Err(corrupted(format!(
            "Snapshot holds entity type {} (expected {})",
            serializable.entity_type, entity_type
        )));
    }
    if serializable.fingerprint != fingerprint {
        return Err(corrupted(format!(
            "Snapshot payload of {} does not match its header fingerprint",
            entity_type
        )));
    }
    Ok(EntityTypeMapping::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================
