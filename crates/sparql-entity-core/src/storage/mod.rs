//! # Mapping Snapshot Storage
//!
//! Persistent caches for built mappings. A cache is consulted by the
//! `MappingRegistry` before building, and only returns a snapshot whose
//! schema fingerprint matches the current declaration.

mod redb_cache;

pub use redb_cache::RedbMappingCache;

use crate::mapping::EntityTypeMapping;
use crate::schema::SchemaFingerprint;
use crate::{EntityTypeId, MappingError};

/// A store of mapping snapshots keyed by entity type.
pub trait MappingCache: Send + Sync {
    /// Load the snapshot of `entity_type` if it was built from a schema with
    /// `fingerprint`. Stale snapshots yield `None`.
    fn load(
        &self,
        entity_type: &EntityTypeId,
        fingerprint: SchemaFingerprint,
    ) -> Result<Option<EntityTypeMapping>, MappingError>;

    /// Store (or replace) the snapshot of a mapping.
    fn store(&self, mapping: &EntityTypeMapping) -> Result<(), MappingError>;

    /// Remove the snapshot of an entity type, if any.
    fn remove(&self, entity_type: &EntityTypeId) -> Result<(), MappingError>;
}
