//! # sparql-entity-core
//!
//! The entity-to-triplestore mapping and multi-graph resolution engine.
//!
//! This crate turns entity-type/bundle/field declarations into predicate
//! mappings, converts field values into RDF terms and back, decides which
//! named graphs entity reads and writes target, and dispatches identifier
//! generation for new entities.
//!
//! ## Components
//!
//! - `mapping` → outbound (bundle → field → column → predicate) and inbound
//!   (predicate → bundle → field) indices, built once per entity type
//! - `codec` → field value ⇄ term conversion driven by the declared format
//! - `graph` → enabled graphs, per-entity request graphs, write target
//! - `identifier` → per-bundle identifier strategies with a fallback
//!
//! ## Architectural Constraints
//!
//! - Never issues SPARQL: callers combine terms and graph URIs into queries
//! - No async, no network dependencies
//! - Built mappings are immutable and shared; only the request graph table
//!   is mutated per operation
//! - Never logs errors on the caller's behalf; every failure is returned

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod config;
pub mod engine;
pub mod format;
pub mod formats;
pub mod graph;
pub mod identifier;
pub mod mapping;
pub mod primitives;
pub mod schema;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Bundle, ColumnName, EntityId, EntityTypeId, FieldName, GraphId, Iri, MappingError,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use codec::{FieldValue, Term, ValueCodec, decode_term, encode_value};
pub use config::EngineConfig;
pub use engine::Engine;
pub use format::{ValueFormat, XsdType};
pub use graph::{
    EntityStub, GraphConfig, GraphDefinition, GraphResolver, GraphSet, RequestGraphContext,
    RequestGraphGuard, SparqlEntity,
};
pub use identifier::{
    HashedStrategy, IdentifierDispatcher, IdentifierStrategy, StrategyDeclaration, UuidStrategy,
};
pub use mapping::{
    ColumnMapping, EntityTypeMapping, FieldRef, InboundMap, MappingBuilder, MappingRegistry,
    OutboundMap,
};
pub use schema::{
    BundleSchema, ColumnSchema, EntityTypeSchema, FieldSchema, SchemaFingerprint, SchemaProvider,
    StaticSchemaProvider,
};
pub use storage::{MappingCache, RedbMappingCache};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{mapping_from_bytes, mapping_to_bytes, snapshot_fingerprint};
