//! Built-in identifier strategies.

use super::IdentifierStrategy;
use crate::graph::SparqlEntity;
use crate::{EntityId, MappingError};
use uuid::Uuid;

/// Time-ordered random identifiers (UUID v7).
///
/// Produces `<base>/<uuid>`, or `urn:uuid:<uuid>` without a base URI. This
/// is the fallback strategy: it cannot fail.
#[derive(Debug, Clone, Default)]
pub struct UuidStrategy {
    base_uri: String,
}

impl UuidStrategy {
    pub const ID: &'static str = "uuid";

    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }
}

impl IdentifierStrategy for UuidStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn generate(&self, _entity: &dyn SparqlEntity) -> Result<EntityId, MappingError> {
        let uuid = Uuid::now_v7();
        Ok(EntityId::new(if self.base_uri.is_empty() {
            format!("urn:uuid:{}", uuid)
        } else {
            format!("{}/{}", self.base_uri.trim_end_matches('/'), uuid)
        }))
    }
}

/// Deterministic identifiers from entity type, bundle and label.
///
/// The same labelled entity always maps to the same URI, so re-importing a
/// record updates it instead of duplicating it. Entities without a label
/// cannot be identified this way.
#[derive(Debug, Clone)]
pub struct HashedStrategy {
    base_uri: String,
}

impl HashedStrategy {
    pub const ID: &'static str = "hashed";

    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }
}

impl IdentifierStrategy for HashedStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn generate(&self, entity: &dyn SparqlEntity) -> Result<EntityId, MappingError> {
        let label = entity
            .label()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| MappingError::IdentifierGeneration {
                entity_type: entity.entity_type_id().clone(),
                bundle: entity.bundle().clone(),
                strategy: Self::ID.to_string(),
                reason: "entity has no label".to_string(),
            })?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(entity.entity_type_id().as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(entity.bundle().as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(label.trim().as_bytes());
        let hex = hasher.finalize().to_hex();

        Ok(EntityId::new(format!(
            "{}/{}/{}",
            self.base_uri.trim_end_matches('/'),
            entity.bundle(),
            &hex.as_str()[..32]
        )))
    }
}
