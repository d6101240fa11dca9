//! # redb-backed Mapping Cache
//!
//! Stores mapping snapshots in a redb embedded database so that a fresh
//! process can skip mapping construction. One row per entity type holds the
//! snapshot bytes (`formats::mapping_to_bytes`); freshness is read from the
//! snapshot header without decoding the mapping.

use super::MappingCache;
use crate::formats::{mapping_from_bytes, mapping_to_bytes, snapshot_fingerprint};
use crate::mapping::EntityTypeMapping;
use crate::schema::SchemaFingerprint;
use crate::{EntityTypeId, MappingError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Table for snapshots: entity type id -> snapshot bytes
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

fn io_err(e: impl std::fmt::Display) -> MappingError {
    MappingError::IoError(e.to_string())
}

/// A disk-backed mapping snapshot cache.
pub struct RedbMappingCache {
    db: Database,
}

impl std::fmt::Debug for RedbMappingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbMappingCache").finish_non_exhaustive()
    }
}

impl RedbMappingCache {
    /// Open or create a cache database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Entity types with a stored snapshot, in key order.
    pub fn entity_types(&self) -> Result<Vec<EntityTypeId>, MappingError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            ids.push(EntityTypeId::from(key.value()));
        }
        Ok(ids)
    }

    /// Stored fingerprint of an entity type's snapshot.
    pub fn fingerprint(
        &self,
        entity_type: &EntityTypeId,
    ) -> Result<Option<SchemaFingerprint>, MappingError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;

        let Some(bytes) = table.get(entity_type.as_str()).map_err(io_err)? else {
            return Ok(None);
        };
        snapshot_fingerprint(bytes.value()).map(Some)
    }

    /// Remove every snapshot.
    pub fn clear(&self) -> Result<(), MappingError> {
        let ids = self.entity_types()?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut snapshots = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            for id in &ids {
                snapshots.remove(id.as_str()).map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

// =============================================================================
// MAPPINGCACHE TRAIT IMPLEMENTATION
// =============================================================================

impl MappingCache for RedbMappingCache {
    fn load(
        &self,
        entity_type: &EntityTypeId,
        fingerprint: SchemaFingerprint,
    ) -> Result<Option<EntityTypeMapping>, MappingError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(SNAPSHOTS).map_err(io_err)?;
        let Some(bytes) = table.get(entity_type.as_str()).map_err(io_err)? else {
            return Ok(None);
        };

        if snapshot_fingerprint(bytes.value())? != fingerprint {
            return Ok(None);
        }
        mapping_from_bytes(bytes.value(), entity_type).map(Some)
    }

    fn store(&self, mapping: &EntityTypeMapping) -> Result<(), MappingError> {
        let bytes = mapping_to_bytes(mapping)?;
        let key = mapping.entity_type().as_str();

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut snapshots = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            snapshots.insert(key, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        tracing::debug!(entity_type = %key, bytes = bytes.len(), "stored mapping snapshot");
        Ok(())
    }

    fn remove(&self, entity_type: &EntityTypeId) -> Result<(), MappingError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut snapshots = write_txn.open_table(SNAPSHOTS).map_err(io_err)?;
            snapshots.remove(entity_type.as_str()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
